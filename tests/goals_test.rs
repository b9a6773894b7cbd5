//! Integration tests for the goal tracker against real SQLite.

use std::sync::Arc;

use praxisd::error::Error;
use praxisd::gamification::goals::GoalService;
use praxisd::storage::Storage;
use tempfile::TempDir;

async fn make_service(dir: &TempDir) -> (Arc<Storage>, GoalService) {
    let storage = Arc::new(Storage::new(dir.path()).await.unwrap());
    let service = GoalService::new(storage.clone());
    (storage, service)
}

async fn make_user(storage: &Storage) -> String {
    storage
        .create_user("goals@example.com", "Goal Setter", "hash", "salt")
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn progress_to_target_completes_the_goal() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage).await;

    let goal = service
        .create(&user, "Read 5 books", 5.0, None)
        .await
        .unwrap();
    assert_eq!(goal.progress, 0.0);
    assert!(!goal.completed);

    let goal = service
        .update_progress(&user, &goal.id, Some(5.0))
        .await
        .unwrap();
    assert_eq!(goal.progress, 5.0);
    assert!(goal.completed);
}

#[tokio::test]
async fn increment_defaults_to_one() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage).await;

    let goal = service
        .create(&user, "Start 3 conversations", 3.0, Some("2026-12-31"))
        .await
        .unwrap();

    let goal = service.update_progress(&user, &goal.id, None).await.unwrap();
    assert_eq!(goal.progress, 1.0);
    assert!(!goal.completed);

    service.update_progress(&user, &goal.id, None).await.unwrap();
    let goal = service.update_progress(&user, &goal.id, None).await.unwrap();
    assert!(goal.completed);
}

#[tokio::test]
async fn overshoot_still_counts_as_completed() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage).await;

    let goal = service.create(&user, "Practice", 2.0, None).await.unwrap();
    let goal = service
        .update_progress(&user, &goal.id, Some(10.0))
        .await
        .unwrap();
    assert_eq!(goal.progress, 10.0);
    assert!(goal.completed);
}

#[tokio::test]
async fn invalid_goals_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage).await;

    let err = service.create(&user, "  ", 5.0, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = service.create(&user, "Zero", 0.0, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = service.create(&user, "Negative", -1.0, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn negative_increments_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage).await;

    let goal = service.create(&user, "No backsliding", 3.0, None).await.unwrap();
    service
        .update_progress(&user, &goal.id, Some(2.0))
        .await
        .unwrap();

    let err = service
        .update_progress(&user, &goal.id, Some(-1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    // Progress was not driven backwards.
    let goal = service.get(&user, &goal.id).await.unwrap();
    assert_eq!(goal.progress, 2.0);
}

#[tokio::test]
async fn missing_goals_and_users_are_not_found() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage).await;

    let err = service.create("nobody", "Goal", 1.0, None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = service
        .update_progress(&user, "missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = service.delete(&user, "missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn delete_removes_the_goal() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage).await;

    let goal = service.create(&user, "Temporary", 1.0, None).await.unwrap();
    service.delete(&user, &goal.id).await.unwrap();
    assert!(service.list(&user).await.unwrap().is_empty());

    let err = service.delete(&user, &goal.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn goals_are_scoped_to_their_owner() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let owner = make_user(&storage).await;
    let other = storage
        .create_user("other@example.com", "Other", "hash", "salt")
        .await
        .unwrap()
        .id;

    let goal = service.create(&owner, "Private", 3.0, None).await.unwrap();
    let err = service
        .update_progress(&other, &goal.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
