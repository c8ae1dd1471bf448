//! Generic repository over any entity tracked by the session.

use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::{Condition, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::{AppResult, OptionExt};

use crate::infra::{Session, SessionHandle};

/// Entities addressed by a UUID key.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Strict CRUD contract: every failure is returned to the caller.
#[async_trait]
pub trait Repository<E>: Send + Sync
where
    E: EntityTrait + 'static,
    E::Model: Identifiable + Clone + Send + Sync + 'static,
{
    /// Every persisted entity, with staged changes applied.
    async fn all(&self) -> AppResult<Vec<E::Model>>;

    /// Fails with `NotFound` when no entity has the identifier.
    async fn get_by_id(&self, id: Uuid) -> AppResult<E::Model>;

    /// Stage the entity and save immediately.
    async fn add(&self, entity: E::Model) -> AppResult<bool>;

    /// Stage the removal and save immediately. Fails with `NotFound` when absent.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Insert when absent, otherwise overwrite the stored fields. Saves immediately.
    async fn upsert(&self, entity: E::Model) -> AppResult<bool>;

    /// Entities matching the condition.
    async fn find(&self, predicate: Condition) -> AppResult<Vec<E::Model>>;
}

/// Session-backed repository for a single entity type.
pub struct GenericRepository<E> {
    session: SessionHandle,
    entity: PhantomData<fn() -> E>,
}

impl<E> GenericRepository<E> {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            entity: PhantomData,
        }
    }

    /// The session shared with the owning unit of work
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }
}

impl<E> Clone for GenericRepository<E> {
    fn clone(&self) -> Self {
        Self::new(self.session.clone())
    }
}

#[async_trait]
impl<E> Repository<E> for GenericRepository<E>
where
    E: EntityTrait + 'static,
    E::Model: Identifiable + Clone + Send + Sync + 'static,
{
    async fn all(&self) -> AppResult<Vec<E::Model>> {
        let session = self.session.lock().await;
        session.select_all(E::find()).await
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<E::Model> {
        let session = self.session.lock().await;
        session.find_by_id::<E>(id).await?.ok_or_not_found()
    }

    async fn add(&self, entity: E::Model) -> AppResult<bool> {
        let mut session = self.session.lock().await;
        insert_and_save::<E>(&mut session, entity).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut session = self.session.lock().await;
        session.find_by_id::<E>(id).await?.ok_or_not_found()?;

        session.stage_removal::<E>(id)?;
        save_or_unstage::<E>(&mut session, id).await
    }

    async fn upsert(&self, entity: E::Model) -> AppResult<bool> {
        let mut session = self.session.lock().await;
        if session.find_by_id::<E>(entity.id()).await?.is_none() {
            return insert_and_save::<E>(&mut session, entity).await;
        }

        let id = entity.id();
        session.stage_update::<E>(entity)?;
        save_or_unstage::<E>(&mut session, id).await
    }

    async fn find(&self, predicate: Condition) -> AppResult<Vec<E::Model>> {
        let session = self.session.lock().await;
        session.select_all(E::find().filter(predicate)).await
    }
}

/// Stage an insert and save it.
async fn insert_and_save<E>(session: &mut Session, entity: E::Model) -> AppResult<bool>
where
    E: EntityTrait + 'static,
    E::Model: Identifiable + Clone + Send + Sync + 'static,
{
    let id = entity.id();
    session.stage_insert::<E>(entity)?;
    save_or_unstage::<E>(session, id).await
}

/// Save the session. A rejected change is unstaged so later saves are not poisoned.
async fn save_or_unstage<E>(session: &mut Session, id: Uuid) -> AppResult<bool>
where
    E: EntityTrait + 'static,
{
    match session.save_changes().await {
        Ok(affected) => Ok(affected > 0),
        Err(err) => {
            session.unstage::<E>(id);
            Err(err)
        }
    }
}
