//! User commands run by the command-line entry point.
//!
//! Each command goes through a unit of work and renders its result as JSON.

use serde::Serialize;
use uuid::Uuid;

use crate::infra::UnitOfWork;
use common::{AppError, AppResult, OptionExt};
use domain::{User, UserResponse};

/// A user-management command.
#[derive(Debug, Clone)]
pub enum UserCommand {
    List,
    Get {
        id: Uuid,
    },
    ByEmail {
        email: String,
    },
    Add {
        first_name: String,
        last_name: String,
        email: String,
        password: String,
    },
    Delete {
        id: Uuid,
    },
}

/// Execute a command and return its JSON output.
pub async fn execute(command: UserCommand, uow: &dyn UnitOfWork) -> AppResult<String> {
    let users = uow.users();

    match command {
        UserCommand::List => {
            let all: Vec<UserResponse> = users.all().await.iter().map(UserResponse::from).collect();
            render(&all)
        }
        UserCommand::Get { id } => {
            let user = users.get_by_id(id).await.into_result()?.ok_or_not_found()?;
            render(&UserResponse::from(user))
        }
        UserCommand::ByEmail { email } => {
            let user = users
                .get_by_email(&email)
                .await
                .into_result()?
                .ok_or_not_found()?;
            render(&UserResponse::from(user))
        }
        UserCommand::Add {
            first_name,
            last_name,
            email,
            password,
        } => {
            let user = User::new(first_name, last_name, email, password);
            user.validate()?;

            users.add(user.clone()).await?;
            tracing::info!(user_id = %user.id, "User added");
            render(&UserResponse::from(user))
        }
        UserCommand::Delete { id } => {
            // Tell a missing user apart from a failed delete.
            users.get_by_id(id).await.into_result()?.ok_or_not_found()?;
            if !users.delete(id).await {
                return Err(AppError::internal(format!("failed to delete user {}", id)));
            }

            uow.complete().await?;
            tracing::info!(user_id = %id, "User deleted");
            render(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn render<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::internal(e.to_string()))
}
