//! Persistence session shared by the repositories of one unit of work.
//!
//! The session records staged changes (inserts, updates, removals) as
//! ready-to-run statements and keeps at most one open database transaction.
//! Reads go through the open transaction when there is one. While changes are
//! staged, queries run after replaying them inside a savepoint that is rolled
//! back, so predicates see the staged values before they are saved.

use std::any::{Any, TypeId};
use std::sync::Arc;

use sea_orm::sea_query::{Expr, Query, SimpleExpr};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    EntityTrait, Iterable, ModelTrait, PrimaryKeyToColumn, QueryFilter, QueryTrait, Select,
    Statement, TransactionTrait,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use common::{AppError, AppResult};

use crate::repository::Identifiable;

/// Shared handle to a session. Owned by the unit of work, cloned into each repository.
pub type SessionHandle = Arc<Mutex<Session>>;

enum Change {
    Insert(Box<dyn Any + Send + Sync>),
    Update(Box<dyn Any + Send + Sync>),
    Remove,
}

struct StagedChange {
    entity: TypeId,
    table: String,
    id: Uuid,
    change: Change,
    statement: Statement,
}

struct OpenTransaction {
    id: u64,
    inner: DatabaseTransaction,
    /// Number of staged changes that existed when the transaction began
    staged_mark: usize,
}

/// What the session knows about one entity instance.
enum Tracked<M> {
    Present(M),
    Removed,
}

/// Change tracker and transaction holder for one unit of work.
pub struct Session {
    db: DatabaseConnection,
    transaction: Option<OpenTransaction>,
    staged: Vec<StagedChange>,
    transactions_begun: u64,
}

impl Session {
    /// Create a session over a database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            transaction: None,
            staged: Vec::new(),
            transactions_begun: 0,
        }
    }

    /// Wrap the session into a shareable handle
    pub fn into_handle(self) -> SessionHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    /// Number of staged changes not yet saved
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Identifier of the open transaction, if any
    pub fn transaction_id(&self) -> Option<u64> {
        self.transaction.as_ref().map(|open| open.id)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Run a select against storage with the staged changes applied.
    pub async fn select_all<E>(&self, select: Select<E>) -> AppResult<Vec<E::Model>>
    where
        E: EntityTrait,
    {
        if self.staged.is_empty() {
            let rows = match &self.transaction {
                Some(open) => select.all(&open.inner).await?,
                None => select.all(&self.db).await?,
            };
            return Ok(rows);
        }

        let rows = match &self.transaction {
            Some(open) => select_staged(&open.inner, &self.staged, select).await?,
            None => select_staged(&self.db, &self.staged, select).await?,
        };
        Ok(rows)
    }

    /// Load one entity by identifier, honoring staged changes.
    pub async fn find_by_id<E>(&self, id: Uuid) -> AppResult<Option<E::Model>>
    where
        E: EntityTrait + 'static,
        E::Model: Identifiable + Clone + 'static,
    {
        match self.tracked::<E>(id) {
            Some(Tracked::Present(model)) => return Ok(Some(model)),
            Some(Tracked::Removed) => return Ok(None),
            None => {}
        }

        let select = E::find().filter(key_column::<E>()?.eq(id));
        let row = match &self.transaction {
            Some(open) => select.one(&open.inner).await?,
            None => select.one(&self.db).await?,
        };
        Ok(row)
    }

    fn tracked<E>(&self, id: Uuid) -> Option<Tracked<E::Model>>
    where
        E: EntityTrait + 'static,
        E::Model: Clone + 'static,
    {
        let entity = TypeId::of::<E>();
        let staged = self
            .staged
            .iter()
            .rev()
            .find(|staged| staged.entity == entity && staged.id == id)?;

        match &staged.change {
            Change::Remove => Some(Tracked::Removed),
            Change::Insert(snapshot) | Change::Update(snapshot) => snapshot
                .downcast_ref::<E::Model>()
                .cloned()
                .map(Tracked::Present),
        }
    }

    // =========================================================================
    // Staging
    // =========================================================================

    pub fn stage_insert<E>(&mut self, model: E::Model) -> AppResult<()>
    where
        E: EntityTrait + 'static,
        E::Model: Identifiable + Send + Sync + 'static,
    {
        let statement = insert_statement::<E>(&model, self.backend())?;
        self.push::<E>(model.id(), Change::Insert(Box::new(model)), statement);
        Ok(())
    }

    pub fn stage_update<E>(&mut self, model: E::Model) -> AppResult<()>
    where
        E: EntityTrait + 'static,
        E::Model: Identifiable + Send + Sync + 'static,
    {
        let statement = update_statement::<E>(&model, self.backend())?;
        self.push::<E>(model.id(), Change::Update(Box::new(model)), statement);
        Ok(())
    }

    pub fn stage_removal<E>(&mut self, id: Uuid) -> AppResult<()>
    where
        E: EntityTrait + 'static,
    {
        let statement = E::delete_many()
            .filter(key_column::<E>()?.eq(id))
            .build(self.backend());
        self.push::<E>(id, Change::Remove, statement);
        Ok(())
    }

    /// Drop the most recent staged change for an entity instance.
    pub fn unstage<E>(&mut self, id: Uuid) -> bool
    where
        E: EntityTrait + 'static,
    {
        let entity = TypeId::of::<E>();
        match self
            .staged
            .iter()
            .rposition(|staged| staged.entity == entity && staged.id == id)
        {
            Some(position) => {
                self.staged.remove(position);
                true
            }
            None => false,
        }
    }

    fn push<E>(&mut self, id: Uuid, change: Change, statement: Statement)
    where
        E: EntityTrait + 'static,
    {
        let table = E::default().table_name().to_owned();
        tracing::trace!(%table, %id, "Change staged");
        self.staged.push(StagedChange {
            entity: TypeId::of::<E>(),
            table,
            id,
            change,
            statement,
        });
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Write every staged change, in staging order, and return the rows affected.
    ///
    /// The batch is all-or-nothing: inside an open transaction it runs in a
    /// savepoint, otherwise in a transaction of its own. A failed batch leaves
    /// storage as it was and keeps the changes staged.
    pub async fn save_changes(&mut self) -> AppResult<u64> {
        if self.staged.is_empty() {
            return Ok(0);
        }

        let affected = match &self.transaction {
            Some(open) => flush_atomically(&open.inner, &self.staged).await?,
            None => flush_atomically(&self.db, &self.staged).await?,
        };

        tracing::debug!(
            changes = self.staged.len(),
            rows_affected = affected,
            "Session changes saved"
        );
        self.staged.clear();
        if let Some(open) = self.transaction.as_mut() {
            open.staged_mark = 0;
        }

        Ok(affected)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub async fn begin(&mut self) -> AppResult<u64> {
        if self.transaction.is_some() {
            return Err(AppError::TransactionAlreadyOpen);
        }

        let inner = self.db.begin().await?;
        self.transactions_begun += 1;
        let id = self.transactions_begun;
        self.transaction = Some(OpenTransaction {
            id,
            inner,
            staged_mark: self.staged.len(),
        });

        tracing::debug!(transaction = id, "Transaction started");
        Ok(id)
    }

    /// Commit the open transaction. `expected` pins the transaction a scope owns.
    pub async fn commit(&mut self, expected: Option<u64>) -> AppResult<()> {
        let open = self.take_transaction(expected)?;
        let id = open.id;

        let unsaved = self.staged.len().saturating_sub(open.staged_mark);
        if unsaved > 0 {
            tracing::warn!(
                transaction = id,
                unsaved,
                "Committing transaction with unsaved staged changes"
            );
        }

        open.inner.commit().await?;
        tracing::debug!(transaction = id, "Transaction committed");
        Ok(())
    }

    /// Roll back the open transaction and discard the changes staged inside it.
    pub async fn rollback(&mut self, expected: Option<u64>) -> AppResult<()> {
        let open = self.take_transaction(expected)?;
        let id = open.id;

        self.staged.truncate(open.staged_mark);
        open.inner.rollback().await?;

        tracing::debug!(transaction = id, "Transaction rolled back");
        Ok(())
    }

    /// Abandon a transaction whose scope was dropped unfinished.
    ///
    /// The provider rolls the transaction back when it is dropped.
    pub fn abandon(&mut self, id: u64) {
        if self.transaction_id() != Some(id) {
            return;
        }

        if let Some(open) = self.transaction.take() {
            self.staged.truncate(open.staged_mark);
            tracing::warn!(
                transaction = id,
                "Transaction scope dropped without commit; rolling back"
            );
        }
    }

    /// Release the session: roll back any open transaction and drop staged changes.
    pub async fn close(&mut self) -> AppResult<()> {
        if !self.staged.is_empty() {
            let tables: Vec<&str> = self
                .staged
                .iter()
                .map(|staged| staged.table.as_str())
                .collect();
            tracing::debug!(?tables, "Discarding unsaved staged changes");
            self.staged.clear();
        }

        if let Some(open) = self.transaction.take() {
            tracing::warn!(
                transaction = open.id,
                "Session closed with an open transaction; rolling back"
            );
            open.inner.rollback().await?;
        }

        Ok(())
    }

    fn take_transaction(&mut self, expected: Option<u64>) -> AppResult<OpenTransaction> {
        match (self.transaction_id(), expected) {
            (Some(open), Some(expected)) if open != expected => {
                return Err(AppError::NoActiveTransaction)
            }
            _ => {}
        }
        self.transaction.take().ok_or(AppError::NoActiveTransaction)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(open) = self.transaction.take() {
            tracing::warn!(
                transaction = open.id,
                "Session dropped with an open transaction; rolling back"
            );
        }
        if !self.staged.is_empty() {
            tracing::debug!(
                changes = self.staged.len(),
                "Session dropped with unsaved staged changes"
            );
        }
    }
}

async fn flush<C>(conn: &C, changes: &[StagedChange]) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let mut affected = 0;
    for staged in changes {
        let result = conn.execute(staged.statement.clone()).await?;
        affected += result.rows_affected();
    }
    Ok(affected)
}

/// Apply the changes in a nested transaction that commits only if all succeed.
async fn flush_atomically<C>(conn: &C, changes: &[StagedChange]) -> Result<u64, DbErr>
where
    C: TransactionTrait,
{
    let txn = conn.begin().await?;
    match flush(&txn, changes).await {
        Ok(affected) => {
            txn.commit().await?;
            Ok(affected)
        }
        Err(err) => {
            txn.rollback().await?;
            Err(err)
        }
    }
}

/// Replay the changes, run the select, then roll everything back.
async fn select_staged<C, E>(
    conn: &C,
    changes: &[StagedChange],
    select: Select<E>,
) -> Result<Vec<E::Model>, DbErr>
where
    C: TransactionTrait,
    E: EntityTrait,
{
    let txn = conn.begin().await?;
    let rows = match flush(&txn, changes).await {
        Ok(_) => select.all(&txn).await,
        Err(err) => Err(err),
    };
    txn.rollback().await?;
    rows
}

/// Primary key column of an entity keyed by a single UUID.
fn key_column<E>() -> AppResult<E::Column>
where
    E: EntityTrait,
{
    E::PrimaryKey::iter()
        .next()
        .map(|key| key.into_column())
        .ok_or_else(|| {
            AppError::internal(format!(
                "entity {} has no primary key",
                E::default().table_name()
            ))
        })
}

fn insert_statement<E>(model: &E::Model, backend: DbBackend) -> AppResult<Statement>
where
    E: EntityTrait,
{
    let columns: Vec<E::Column> = E::Column::iter().collect();
    let values: Vec<SimpleExpr> = columns
        .iter()
        .map(|column| Expr::value(model.get(*column)))
        .collect();

    let mut insert = Query::insert();
    insert
        .into_table(E::default().table_ref())
        .columns(columns)
        .values(values)
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(backend.build(&insert))
}

fn update_statement<E>(model: &E::Model, backend: DbBackend) -> AppResult<Statement>
where
    E: EntityTrait,
    E::Model: Identifiable,
{
    let key = key_column::<E>()?;
    let update = E::Column::iter().fold(E::update_many(), |update, column| {
        update.col_expr(column, Expr::value(model.get(column)))
    });

    Ok(update.filter(key.eq(model.id())).build(backend))
}
