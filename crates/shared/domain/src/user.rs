//! User domain entity and related types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{EMAIL_SEPARATOR, MIN_NAME_LENGTH, MIN_PASSWORD_LENGTH};
use crate::error::{DomainError, DomainResult};

/// User domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl User {
    /// Create a new user with a freshly generated identifier
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), first_name, last_name, email, password)
    }

    /// Create a user with a known identifier
    pub fn with_id(
        id: Uuid,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Check the business rules a user must satisfy before it is stored.
    pub fn validate(&self) -> DomainResult<()> {
        if self.first_name.trim().len() < MIN_NAME_LENGTH {
            return Err(DomainError::validation("First name is required"));
        }
        if self.last_name.trim().len() < MIN_NAME_LENGTH {
            return Err(DomainError::validation("Last name is required"));
        }
        if !self.email.contains(EMAIL_SEPARATOR) {
            return Err(DomainError::validation("Email address is invalid"));
        }
        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

/// User response (safe to return to client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    /// Unique user identifier
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// User email address
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        }
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_user() -> User {
        User::new("Ada", "Lovelace", "ada@example.com", "analytical")
    }

    #[test]
    fn test_valid_user_passes_validation() {
        assert!(valid_user().validate().is_ok());
    }

    #[test]
    fn test_missing_first_name_is_rejected() {
        let user = User {
            first_name: "  ".to_string(),
            ..valid_user()
        };
        assert!(matches!(user.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_email_without_separator_is_rejected() {
        let user = User {
            email: "ada.example.com".to_string(),
            ..valid_user()
        };
        assert_eq!(
            user.validate(),
            Err(DomainError::validation("Email address is invalid"))
        );
    }

    #[test]
    fn test_short_password_is_rejected() {
        let user = User {
            password: "short".to_string(),
            ..valid_user()
        };
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_serialized_user_omits_password() {
        let user = valid_user();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("analytical"));
        assert!(json.contains("ada@example.com"));
    }

    #[test]
    fn test_response_from_user() {
        let user = valid_user();
        let response = UserResponse::from(&user);
        assert_eq!(response.id, user.id);
        assert_eq!(user.full_name(), "Ada Lovelace");
    }
}
