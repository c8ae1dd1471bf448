//! User repository integration tests.

mod support;

use sea_orm::{ColumnTrait, Condition, ConnectionTrait};
use tracing::Level;
use uuid::Uuid;

use ::common::AppError;
use pocketbook_lib::infra::UnitOfWork;
use pocketbook_lib::repository::entities::user;
use pocketbook_lib::repository::Lookup;

use crate::support::{create_test_user, persisted, seed, setup, RepositoryLogs};

#[tokio::test]
async fn test_get_by_email_returns_added_user() {
    let (_db, uow) = setup().await;
    let users = uow.users();

    let ada = create_test_user("ada@example.com");
    assert!(users.add(ada.clone()).await.unwrap());

    let found = users.get_by_email("ada@example.com").await;
    assert_eq!(found.found(), Some(ada));
}

#[tokio::test]
async fn test_get_by_email_is_exact_match() {
    let (db, uow) = setup().await;
    seed(&db, &[create_test_user("ada@example.com")]).await;

    let lookup = uow.users().get_by_email("ADA@example.com").await;
    assert!(lookup.is_not_found());
}

#[tokio::test]
async fn test_get_by_id_missing_logs_once() {
    let (_db, uow) = setup().await;
    let logs = RepositoryLogs::default();
    let _guard = logs.install();

    let lookup = uow.users().get_by_id(Uuid::new_v4()).await;

    assert!(lookup.is_not_found());
    assert_eq!(logs.count(), 1);
    assert_eq!(logs.count_at(Level::WARN), 1);
}

#[tokio::test]
async fn test_found_lookup_does_not_log() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");
    seed(&db, &[ada.clone()]).await;

    let logs = RepositoryLogs::default();
    let _guard = logs.install();

    assert!(uow.users().get_by_id(ada.id).await.is_found());
    assert_eq!(logs.count(), 0);
}

#[tokio::test]
async fn test_delete_is_staged_until_saved() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");
    let grace = create_test_user("grace@example.com");
    seed(&db, &[ada.clone(), grace.clone()]).await;

    let users = uow.users();
    assert!(users.delete(ada.id).await);

    // Hidden from this unit of work, still stored.
    assert!(users.get_by_id(ada.id).await.is_not_found());
    assert_eq!(users.all().await, vec![grace.clone()]);
    assert_eq!(persisted(&db).await.len(), 2);

    uow.complete().await.unwrap();

    assert_eq!(persisted(&db).await, vec![grace]);
    assert!(matches!(
        uow.users().get_by_id(ada.id).await.into_result(),
        Ok(None)
    ));
}

#[tokio::test]
async fn test_delete_missing_returns_false_without_logging() {
    let (_db, uow) = setup().await;
    let logs = RepositoryLogs::default();
    let _guard = logs.install();

    assert!(!uow.users().delete(Uuid::new_v4()).await);
    assert_eq!(logs.count(), 0);
    assert!(!uow.has_changes().await);
}

#[tokio::test]
async fn test_upsert_existing_is_staged_until_saved() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");
    seed(&db, &[ada.clone()]).await;

    let mut renamed = ada.clone();
    renamed.first_name = "Augusta".to_string();
    renamed.email = "augusta@example.com".to_string();

    let users = uow.users();
    assert!(users.upsert(renamed.clone()).await);

    // The unit of work sees the new values, storage still has the old ones.
    assert_eq!(users.get_by_id(ada.id).await.found(), Some(renamed.clone()));
    assert_eq!(persisted(&db).await, vec![ada.clone()]);

    assert_eq!(uow.save_changes().await.unwrap(), 1);
    assert_eq!(persisted(&db).await, vec![renamed]);
}

#[tokio::test]
async fn test_staged_update_is_visible_to_find_and_email_lookup() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");
    seed(&db, &[ada.clone()]).await;

    let mut renamed = ada.clone();
    renamed.last_name = "King".to_string();

    let users = uow.users();
    assert!(users.upsert(renamed.clone()).await);

    let found = users
        .find(Condition::all().add(user::Column::Email.eq("ada@example.com")))
        .await
        .unwrap();
    assert_eq!(found, vec![renamed.clone()]);
    assert_eq!(
        users.get_by_email("ada@example.com").await.found(),
        Some(renamed)
    );
}

#[tokio::test]
async fn test_staged_email_change_moves_email_lookup() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");
    seed(&db, &[ada.clone()]).await;

    let mut renamed = ada.clone();
    renamed.email = "countess@example.com".to_string();

    let users = uow.users();
    assert!(users.upsert(renamed.clone()).await);

    assert!(users.get_by_email("ada@example.com").await.is_not_found());
    assert_eq!(
        users.get_by_email("countess@example.com").await.found(),
        Some(renamed.clone())
    );

    let old = users
        .find(Condition::all().add(user::Column::Email.eq("ada@example.com")))
        .await
        .unwrap();
    assert!(old.is_empty());
    let new = users
        .find(Condition::all().add(user::Column::Email.eq("countess@example.com")))
        .await
        .unwrap();
    assert_eq!(new, vec![renamed.clone()]);

    // Reads leave the change staged and storage untouched.
    assert!(uow.has_changes().await);
    assert_eq!(persisted(&db).await, vec![ada]);
}

#[tokio::test]
async fn test_staged_removal_is_hidden_from_find() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");
    let grace = create_test_user("grace@example.com");
    seed(&db, &[ada.clone(), grace.clone()]).await;

    let users = uow.users();
    assert!(users.delete(ada.id).await);

    let found = users
        .find(Condition::all().add(user::Column::Email.ends_with("@example.com")))
        .await
        .unwrap();
    assert_eq!(found, vec![grace]);
    assert!(users.get_by_email("ada@example.com").await.is_not_found());
}

#[tokio::test]
async fn test_upsert_absent_adds_immediately() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");

    assert!(uow.users().upsert(ada.clone()).await);

    assert!(!uow.has_changes().await);
    assert_eq!(persisted(&db).await, vec![ada]);
}

#[tokio::test]
async fn test_upsert_twice_leaves_one_user() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");

    let users = uow.users();
    assert!(users.upsert(ada.clone()).await);
    assert!(users.upsert(ada.clone()).await);
    uow.complete().await.unwrap();

    assert_eq!(persisted(&db).await, vec![ada]);
}

#[tokio::test]
async fn test_add_duplicate_propagates_error() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");
    seed(&db, &[ada.clone()]).await;

    let result = uow.users().add(ada).await;
    assert!(matches!(
        result,
        Err(AppError::Conflict(_)) | Err(AppError::Database(_))
    ));
}

#[tokio::test]
async fn test_storage_failures_become_sentinels() {
    let (db, uow) = setup().await;
    let ada = create_test_user("ada@example.com");
    seed(&db, &[ada.clone()]).await;

    db.connection()
        .execute_unprepared("DROP TABLE users")
        .await
        .unwrap();

    let logs = RepositoryLogs::default();
    let _guard = logs.install();
    let users = uow.users();

    assert!(users.all().await.is_empty());
    assert!(users.get_by_id(ada.id).await.is_failed());
    assert!(users.get_by_email("ada@example.com").await.is_failed());
    assert!(!users.upsert(ada.clone()).await);
    assert!(!users.delete(ada.id).await);
    assert_eq!(logs.count_at(Level::ERROR), 5);

    // Strict operations still report the failure.
    assert!(users.add(create_test_user("grace@example.com")).await.is_err());
    assert!(users.find(Condition::all()).await.is_err());
}

#[tokio::test]
async fn test_failed_lookup_is_distinct_from_not_found() {
    let (db, uow) = setup().await;
    db.connection()
        .execute_unprepared("DROP TABLE users")
        .await
        .unwrap();

    match uow.users().get_by_id(Uuid::new_v4()).await {
        Lookup::Failed(err) => assert_eq!(err.code(), "DATABASE_ERROR"),
        other => panic!("expected a failed lookup, got {:?}", other),
    }
}
