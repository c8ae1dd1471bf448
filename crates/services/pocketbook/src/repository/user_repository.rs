//! User repository with logged, non-throwing reads and staged writes.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, Condition};
use uuid::Uuid;

use super::base::{GenericRepository, Repository};
use super::entities::user::{self, Entity as UserEntity};
use super::lookup::Lookup;
use crate::infra::SessionHandle;
use common::{AppError, AppResult, OptionExt};
use domain::User;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const REPOSITORY: &str = "UserRepository";

/// User repository trait for dependency injection.
///
/// Reads and staging operations never return an error: failures are logged
/// and reported through a sentinel (`Lookup::Failed`, an empty list, `false`).
/// `delete` and `upsert` of an existing user only stage the change; it reaches
/// storage on the unit of work's next save.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All users, or an empty list when the read fails
    async fn all(&self) -> Vec<User>;

    async fn get_by_id(&self, id: Uuid) -> Lookup<User>;

    /// Insert and save immediately. Failures propagate.
    async fn add(&self, user: User) -> AppResult<bool>;

    /// Stage removal of the user; `false` when absent or on failure
    async fn delete(&self, id: Uuid) -> bool;

    /// Add when absent (saved immediately), otherwise stage a field update
    async fn upsert(&self, user: User) -> bool;

    /// Users matching the condition. Failures propagate.
    async fn find(&self, predicate: Condition) -> AppResult<Vec<User>>;

    /// First user whose email matches exactly
    async fn get_by_email(&self, email: &str) -> Lookup<User>;
}

/// Session-backed implementation of UserRepository
pub struct UserStore {
    users: GenericRepository<UserEntity>,
}

impl UserStore {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            users: GenericRepository::new(session),
        }
    }

    /// The underlying repository, whose operations propagate every error.
    pub fn strict(&self) -> &GenericRepository<UserEntity> {
        &self.users
    }

    async fn try_delete(&self, id: Uuid) -> AppResult<bool> {
        let mut session = self.users.session().lock().await;
        if session.find_by_id::<UserEntity>(id).await?.is_none() {
            return Ok(false);
        }

        session.stage_removal::<UserEntity>(id)?;
        Ok(true)
    }

    async fn try_upsert(&self, user: User) -> AppResult<bool> {
        let existing = {
            let session = self.users.session().lock().await;
            session.find_by_id::<UserEntity>(user.id).await?
        };

        let Some(mut tracked) = existing else {
            return self.users.add(user.into()).await;
        };

        tracked.copy_fields_from(user);
        self.users
            .session()
            .lock()
            .await
            .stage_update::<UserEntity>(tracked)?;
        Ok(true)
    }

    async fn try_get_by_email(&self, email: &str) -> AppResult<user::Model> {
        let matches = self
            .users
            .find(Condition::all().add(user::Column::Email.eq(email)))
            .await?;
        matches.into_iter().next().ok_or_not_found()
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn all(&self) -> Vec<User> {
        match self.users.all().await {
            Ok(models) => models.into_iter().map(User::from).collect(),
            Err(err) => {
                log_failure("all", &err);
                Vec::new()
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Lookup<User> {
        let lookup = Lookup::from(self.users.get_by_id(id).await).map(User::from);
        report("get_by_id", &lookup);
        lookup
    }

    async fn add(&self, user: User) -> AppResult<bool> {
        self.users.add(user.into()).await
    }

    async fn delete(&self, id: Uuid) -> bool {
        self.try_delete(id).await.unwrap_or_else(|err| {
            log_failure("delete", &err);
            false
        })
    }

    async fn upsert(&self, user: User) -> bool {
        self.try_upsert(user).await.unwrap_or_else(|err| {
            log_failure("upsert", &err);
            false
        })
    }

    async fn find(&self, predicate: Condition) -> AppResult<Vec<User>> {
        let models = self.users.find(predicate).await?;
        Ok(models.into_iter().map(User::from).collect())
    }

    async fn get_by_email(&self, email: &str) -> Lookup<User> {
        let lookup = Lookup::from(self.try_get_by_email(email).await).map(User::from);
        report("get_by_email", &lookup);
        lookup
    }
}

fn report<T>(operation: &'static str, lookup: &Lookup<T>) {
    match lookup {
        Lookup::Found(_) => {}
        Lookup::NotFound => tracing::warn!(
            repository = REPOSITORY,
            operation,
            "{} {} found no matching user",
            REPOSITORY,
            operation
        ),
        Lookup::Failed(err) => log_failure(operation, err),
    }
}

fn log_failure(operation: &'static str, err: &AppError) {
    tracing::error!(
        repository = REPOSITORY,
        operation,
        code = err.code(),
        error = ?err,
        "{} {} function error",
        REPOSITORY,
        operation
    );
}
