//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// Validation
// =============================================================================

/// Minimum password length requirement
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum length of first and last names
pub const MIN_NAME_LENGTH: usize = 1;

/// Character every email address must contain
pub const EMAIL_SEPARATOR: char = '@';
