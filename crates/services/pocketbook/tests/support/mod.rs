//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use ::common::DatabaseConfig;
use domain::User;
use pocketbook_lib::infra::{Database, Persistence, UnitOfWork};

/// Fresh in-memory database with the schema in place.
pub async fn setup() -> (Database, Persistence) {
    let database = Database::connect(&DatabaseConfig::in_memory())
        .await
        .expect("in-memory database should open");
    let uow = database.unit_of_work();
    (database, uow)
}

pub fn create_test_user(email: &str) -> User {
    User::new("Test", "User", email, "password123")
}

/// Add users through a separate unit of work so they are persisted.
pub async fn seed(database: &Database, users: &[User]) {
    let uow = database.unit_of_work();
    for user in users {
        uow.users()
            .add(user.clone())
            .await
            .expect("seed user should insert");
    }
}

/// Users as stored, read through a separate unit of work.
///
/// Must not be called while another unit of work holds an open transaction:
/// the in-memory pool has a single connection.
pub async fn persisted(database: &Database) -> Vec<User> {
    database.unit_of_work().users().all().await
}

/// Counts warn and error events emitted by the repository layer.
#[derive(Clone, Default)]
pub struct RepositoryLogs {
    events: Arc<Mutex<Vec<Level>>>,
}

impl RepositoryLogs {
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn count_at(&self, level: Level) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| **recorded == level)
            .count()
    }
}

impl<S: Subscriber> Layer<S> for RepositoryLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if metadata.target().starts_with("pocketbook_lib::repository")
            && (level == Level::WARN || level == Level::ERROR)
        {
            self.events.lock().unwrap().push(level);
        }
    }
}
