//! Unit of Work pattern implementation.
//!
//! The unit of work owns one persistence session and hands out repositories
//! that share it. Changes staged through those repositories are written
//! together by `save_changes`, inside the explicit transaction when one is
//! open.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use once_cell::sync::OnceCell;
use sea_orm::{DatabaseConnection, EntityTrait};

use super::session::{Session, SessionHandle};
use crate::repository::{GenericRepository, UserRepository, UserStore};
use common::AppResult;

/// Unit of Work trait for dependency injection.
///
/// At most one explicit transaction is open at a time. Beginning a second one,
/// or committing and rolling back with none open, is reported as a transaction
/// misuse error.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// User repository; the same instance on every call
    fn users(&self) -> Arc<dyn UserRepository>;

    /// Open an explicit transaction.
    async fn begin_transaction(&self) -> AppResult<TransactionScope>;

    async fn commit_transaction(&self) -> AppResult<()>;

    /// Roll back and discard the changes staged since the transaction began.
    async fn rollback_transaction(&self) -> AppResult<()>;

    /// Persist every staged change and return the number of rows affected.
    async fn save_changes(&self) -> AppResult<u64>;

    /// Finish the current unit of work by saving its staged changes.
    async fn complete(&self) -> AppResult<()> {
        self.save_changes().await.map(|_| ())
    }
}

/// Handle to an explicit transaction.
///
/// Dropping an unfinished scope rolls the transaction back.
#[must_use = "a transaction scope rolls back when dropped without commit"]
pub struct TransactionScope {
    session: SessionHandle,
    id: u64,
    finished: bool,
}

impl TransactionScope {
    fn new(session: SessionHandle, id: u64) -> Self {
        Self {
            session,
            id,
            finished: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn commit(mut self) -> AppResult<()> {
        self.finished = true;
        self.session.lock().await.commit(Some(self.id)).await
    }

    pub async fn rollback(mut self) -> AppResult<()> {
        self.finished = true;
        self.session.lock().await.rollback(Some(self.id)).await
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        match self.session.try_lock() {
            Ok(mut session) => session.abandon(self.id),
            // The session rolls back whatever is still open when it is released.
            Err(_) => tracing::warn!(
                transaction = self.id,
                "Session busy while dropping transaction scope"
            ),
        }
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    session: SessionHandle,
    users: OnceCell<Arc<UserStore>>,
}

impl Persistence {
    /// Create new UnitOfWork instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            session: Session::new(db).into_handle(),
            users: OnceCell::new(),
        }
    }

    /// Strict repository for any entity, sharing this unit of work's session.
    pub fn repository<E>(&self) -> GenericRepository<E>
    where
        E: EntityTrait,
    {
        GenericRepository::new(self.session.clone())
    }

    /// Whether staged changes are waiting to be saved
    pub async fn has_changes(&self) -> bool {
        self.session.lock().await.has_changes()
    }

    /// Execute a closure within a transaction.
    ///
    /// Changes staged by the closure are saved before the commit. The
    /// transaction is rolled back when the closure or the save fails.
    pub async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(&'a Self) -> BoxFuture<'a, AppResult<T>> + Send,
        T: Send,
    {
        let scope = self.begin_transaction().await?;

        let outcome = match f(self).await {
            Ok(result) => self.save_changes().await.map(|_| result),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                scope.commit().await?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = scope.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Release the unit of work, rolling back an open transaction and
    /// discarding unsaved changes.
    pub async fn dispose(self) -> AppResult<()> {
        self.session.lock().await.close().await
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users
            .get_or_init(|| Arc::new(UserStore::new(self.session.clone())))
            .clone()
    }

    async fn begin_transaction(&self) -> AppResult<TransactionScope> {
        let id = self.session.lock().await.begin().await?;
        Ok(TransactionScope::new(self.session.clone(), id))
    }

    async fn commit_transaction(&self) -> AppResult<()> {
        self.session.lock().await.commit(None).await
    }

    async fn rollback_transaction(&self) -> AppResult<()> {
        self.session.lock().await.rollback(None).await
    }

    async fn save_changes(&self) -> AppResult<u64> {
        self.session.lock().await.save_changes().await
    }
}

impl From<DatabaseConnection> for Persistence {
    fn from(db: DatabaseConnection) -> Self {
        Self::new(db)
    }
}

/// Run a block inside `Persistence::transaction`.
///
/// ```ignore
/// with_transaction!(uow, |tx| {
///     tx.users().add(user).await?;
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(|$ctx| Box::pin(async move { $body })).await
    };
}
