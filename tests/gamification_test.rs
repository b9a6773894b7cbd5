//! Integration tests for the gamification updater against real SQLite:
//! award transactions, streak progression, badge union vs. recompute.

use std::sync::Arc;

use chrono::NaiveDate;
use praxisd::error::Error;
use praxisd::gamification::curve::LevelCurve;
use praxisd::gamification::updater::GamificationService;
use praxisd::storage::Storage;
use tempfile::TempDir;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

async fn make_service(dir: &TempDir) -> (Arc<Storage>, GamificationService) {
    let storage = Arc::new(Storage::new(dir.path()).await.unwrap());
    let service = GamificationService::new(
        storage.clone(),
        Arc::new(LevelCurve::linear(100)),
        50,
        25,
    );
    (storage, service)
}

async fn make_user(storage: &Storage, email: &str) -> String {
    storage
        .create_user(email, "Test User", "hash", "salt")
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn award_accumulates_and_levels_up() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "a@example.com").await;

    let stats = service.award_on(&user, 150, d("2026-08-01")).await.unwrap();
    assert_eq!(stats.experience, 150);
    // Linear base 100: level 2 spans [100, 300).
    assert_eq!(stats.level, 2);
    assert_eq!(stats.progress.xp_into_level, 50);
    assert_eq!(stats.streak, 1);
    assert!(stats.badges.iter().any(|b| b == "XP Warrior"));
    assert!(!stats.badges.iter().any(|b| b == "Level 10 Achiever"));
    assert!(stats.new_badges.iter().any(|b| b == "XP Warrior"));
}

#[tokio::test]
async fn split_awards_match_single_award() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let split = make_user(&storage, "split@example.com").await;
    let single = make_user(&storage, "single@example.com").await;
    let day = d("2026-08-01");

    service.award_on(&split, 30, day).await.unwrap();
    let a = service.award_on(&split, 70, day).await.unwrap();
    let b = service.award_on(&single, 100, day).await.unwrap();

    assert_eq!(a.experience, b.experience);
    assert_eq!(a.level, b.level);
}

#[tokio::test]
async fn negative_delta_is_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "neg@example.com").await;

    let err = service.award(&user, -10).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let stats = storage.get_stats(&user).await.unwrap().unwrap();
    assert_eq!(stats.experience, 0);
    assert_eq!(stats.level, 1);
    assert!(stats.last_activity_date.is_none());
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (_storage, service) = make_service(&dir).await;
    let err = service.award("nope", 10).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn huge_awards_saturate_instead_of_overflowing() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "max@example.com").await;

    let stats = service.award(&user, i64::MAX - 10).await.unwrap();
    assert_eq!(stats.experience, i64::MAX - 10);
    assert!(stats.progress.level >= 1);
    assert!(stats.badges.iter().any(|b| b == "XP Legend"));

    // Pushing past the top of the range caps at i64::MAX; the level
    // derivation stays consistent instead of wrapping.
    let stats = service.award(&user, 10_000).await.unwrap();
    assert_eq!(stats.experience, i64::MAX);
    assert!(stats.level >= 1);
}

#[tokio::test]
async fn failed_award_leaves_the_pool_usable() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "clean@example.com").await;

    // An aborted award must roll back; the next transactions on the same
    // small pool would otherwise find a connection stuck mid-transaction.
    for _ in 0..3 {
        let err = service.award("ghost", 10).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    service.award(&user, 10).await.unwrap();
    let stats = service.award(&user, 10).await.unwrap();
    assert_eq!(stats.experience, 20);
}

#[tokio::test]
async fn streak_counts_consecutive_days_only() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "streak@example.com").await;

    let s = service.award_on(&user, 10, d("2026-08-01")).await.unwrap();
    assert_eq!(s.streak, 1);

    let s = service.award_on(&user, 10, d("2026-08-02")).await.unwrap();
    assert_eq!(s.streak, 2);

    // Second activity on an already-counted day: no double count.
    let s = service.award_on(&user, 10, d("2026-08-02")).await.unwrap();
    assert_eq!(s.streak, 2);

    // Three-day gap: back to 1.
    let s = service.award_on(&user, 10, d("2026-08-05")).await.unwrap();
    assert_eq!(s.streak, 1);
    assert_eq!(s.last_activity_date.as_deref(), Some("2026-08-05"));
}

#[tokio::test]
async fn badges_survive_streak_loss_until_recompute() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "badges@example.com").await;

    // Five consecutive days → Streak Master.
    for day in 1..=5 {
        let date = d(&format!("2026-08-0{day}"));
        service.award_on(&user, 5, date).await.unwrap();
    }
    let stats = service.stats(&user).await.unwrap();
    assert_eq!(stats.streak, 5);
    assert!(stats.badges.iter().any(|b| b == "Streak Master"));

    // A long gap resets the streak, but the award path only unions badges.
    let stats = service.award_on(&user, 5, d("2026-08-20")).await.unwrap();
    assert_eq!(stats.streak, 1);
    assert!(stats.badges.iter().any(|b| b == "Streak Master"));

    // Administrative recompute replaces the set from current stats.
    let badges = service.recompute_badges(&user).await.unwrap();
    assert!(!badges.iter().any(|b| b == "Streak Master"));
}

#[tokio::test]
async fn scenario_completion_awards_xp_and_completion_badge() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "done@example.com").await;
    let scenario = storage
        .create_scenario("Small talk", "Practice small talk", "conversation", "easy", None)
        .await
        .unwrap();

    let stats = service.complete_scenario(&user, &scenario.id).await.unwrap();
    assert_eq!(stats.experience, 50); // configured default
    assert!(stats.badges.iter().any(|b| b == "Getting Started"));

    // Replaying the scenario earns XP again but the completed count stays 1.
    let stats = service.complete_scenario(&user, &scenario.id).await.unwrap();
    assert_eq!(stats.experience, 100);
    assert_eq!(storage.completed_scenario_count(&user).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_completion_award_leaves_no_completion_row() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let scenario = storage
        .create_scenario("Orphan check", "Completion and award commit together", "misc", "easy", None)
        .await
        .unwrap();

    let err = service.complete_scenario("ghost", &scenario.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(storage.completed_scenario_count("ghost").await.unwrap(), 0);
}

#[tokio::test]
async fn scenario_xp_override_wins_over_default() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "override@example.com").await;
    let scenario = storage
        .create_scenario("Conflict", "De-escalation drill", "conflict", "hard", Some(200))
        .await
        .unwrap();

    let stats = service.complete_scenario(&user, &scenario.id).await.unwrap();
    assert_eq!(stats.experience, 200);
}

#[tokio::test]
async fn level_column_always_matches_derivation() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "inv@example.com").await;

    for delta in [0, 1, 99, 250, 1000] {
        let view = service.award(&user, delta).await.unwrap();
        let row = storage.get_stats(&user).await.unwrap().unwrap();
        assert_eq!(row.level as u32, view.progress.level);
        assert_eq!(row.experience, view.experience);
    }
}

#[tokio::test]
async fn storage_opens_with_slow_query_logging_enabled() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new_with_slow_query(dir.path(), 250).await.unwrap();
    let user = storage
        .create_user("slow@example.com", "Slow Query", "hash", "salt")
        .await
        .unwrap();
    assert_eq!(storage.get_user(&user.id).await.unwrap().unwrap().email, "slow@example.com");
}

#[tokio::test]
async fn deleting_a_user_drops_their_gamification_state() {
    let dir = TempDir::new().unwrap();
    let (storage, service) = make_service(&dir).await;
    let user = make_user(&storage, "gone@example.com").await;
    service.award(&user, 100).await.unwrap();

    assert!(storage.delete_user(&user).await.unwrap());
    assert!(storage.get_stats(&user).await.unwrap().is_none());
    assert!(storage.list_badges(&user).await.unwrap().is_empty());
}
