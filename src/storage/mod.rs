use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, Sqlite, SqlitePool, Transaction};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gamification::badges::{self, StatSnapshot};
use crate::gamification::curve::LevelCurve;
use crate::gamification::{level, streak};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Persistence(format!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        ))),
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub password_salt: String,
    /// `"user"` or `"admin"`. The first registered account becomes admin.
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScenarioRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    /// Per-scenario XP override. NULL falls back to the configured default.
    pub xp_reward: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssessmentRow {
    pub id: String,
    pub user_id: String,
    pub scenario_id: Option<String>,
    pub rating: i64,
    pub reflection: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedbackRow {
    pub id: String,
    pub scenario_id: String,
    pub author_id: String,
    pub body: String,
    pub rating: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserStatsRow {
    pub user_id: String,
    pub experience: i64,
    /// Cached derivation of `experience` — written only together with it.
    pub level: i64,
    pub streak: i64,
    /// UTC calendar day of the last XP-earning activity, `YYYY-MM-DD`.
    pub last_activity_date: Option<String>,
    pub updated_at: String,
}

impl UserStatsRow {
    pub fn last_activity(&self) -> Option<NaiveDate> {
        self.last_activity_date
            .as_deref()
            .and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GoalRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub target: f64,
    pub progress: f64,
    pub deadline: Option<String>,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Result of one award transaction.
#[derive(Debug, Clone)]
pub struct AwardOutcome {
    pub stats: UserStatsRow,
    /// Full badge set after the union.
    pub badges: Vec<String>,
    /// Badges first earned by this award.
    pub new_badges: Vec<String>,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| Error::Persistence(format!("cannot create data dir: {e}")))?;
        let db_path = data_dir.join("praxis.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))
                .map_err(|e| Error::Persistence(e.to_string()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .map_err(|e| Error::Persistence(format!("failed to run database migrations: {e}")))?;
        Ok(())
    }

    /// Start an IMMEDIATE transaction.
    ///
    /// IMMEDIATE takes the write lock up front, so the reads inside the
    /// transaction can never be stale relative to its own write — a deferred
    /// transaction upgrading to a write after a concurrent commit would fail
    /// with SQLITE_BUSY_SNAPSHOT instead of waiting on the busy timeout.
    /// The guard rolls back on drop unless committed, so an error (or a
    /// failed COMMIT) never returns a connection to the pool mid-transaction.
    async fn begin_immediate(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    // ─── Users ──────────────────────────────────────────────────────────────

    /// Insert a user and their zeroed stats row in one transaction.
    ///
    /// The very first account becomes `admin`; everyone after is `user`.
    pub async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<UserRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        let role = if count == 0 { "admin" } else { "user" };
        sqlx::query(
            "INSERT INTO users (id, email, display_name, password_hash, password_salt, role, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .bind(password_salt)
        .bind(role)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO user_stats (user_id, updated_at) VALUES (?, ?)")
            .bind(&id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.get_user(&id).await?.ok_or(Error::NotFound("user"))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Delete a user. Stats, badges, goals, completions, assessments,
    /// feedback, and tokens cascade via foreign keys.
    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Auth tokens ────────────────────────────────────────────────────────

    pub async fn insert_token(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO auth_tokens (token_hash, user_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(&now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a token digest to its (non-expired) owner.
    pub async fn lookup_token(&self, token_hash: &str) -> Result<Option<UserRow>> {
        let now = Utc::now().to_rfc3339();
        Ok(sqlx::query_as(
            "SELECT u.* FROM users u
             JOIN auth_tokens t ON t.user_id = u.id
             WHERE t.token_hash = ? AND t.expires_at > ?",
        )
        .bind(token_hash)
        .bind(&now)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Delete expired tokens and return the count (daily background pruning).
    pub async fn prune_expired_tokens(&self) -> Result<u64> {
        with_timeout(async {
            let now = Utc::now().to_rfc3339();
            let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
                .bind(&now)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    // ─── Scenarios ──────────────────────────────────────────────────────────

    pub async fn create_scenario(
        &self,
        title: &str,
        description: &str,
        category: &str,
        difficulty: &str,
        xp_reward: Option<i64>,
    ) -> Result<ScenarioRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO scenarios (id, title, description, category, difficulty, xp_reward, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(difficulty)
        .bind(xp_reward)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_scenario(&id)
            .await?
            .ok_or(Error::NotFound("scenario"))
    }

    pub async fn get_scenario(&self, id: &str) -> Result<Option<ScenarioRow>> {
        Ok(sqlx::query_as("SELECT * FROM scenarios WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_scenarios(&self, category: Option<&str>) -> Result<Vec<ScenarioRow>> {
        with_timeout(async {
            if let Some(cat) = category {
                Ok(sqlx::query_as(
                    "SELECT * FROM scenarios WHERE category = ? ORDER BY created_at DESC",
                )
                .bind(cat)
                .fetch_all(&self.pool)
                .await?)
            } else {
                Ok(
                    sqlx::query_as("SELECT * FROM scenarios ORDER BY created_at DESC")
                        .fetch_all(&self.pool)
                        .await?,
                )
            }
        })
        .await
    }

    pub async fn completed_scenario_count(&self, user_id: &str) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scenario_completions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    // ─── Assessments ────────────────────────────────────────────────────────

    pub async fn create_assessment(
        &self,
        user_id: &str,
        scenario_id: Option<&str>,
        rating: i64,
        reflection: &str,
    ) -> Result<AssessmentRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO assessments (id, user_id, scenario_id, rating, reflection, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(scenario_id)
        .bind(rating)
        .bind(reflection)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(
            sqlx::query_as("SELECT * FROM assessments WHERE id = ?")
                .bind(&id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    pub async fn list_assessments(&self, user_id: &str) -> Result<Vec<AssessmentRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM assessments WHERE user_id = ? ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    // ─── Feedback ───────────────────────────────────────────────────────────

    pub async fn create_feedback(
        &self,
        scenario_id: &str,
        author_id: &str,
        body: &str,
        rating: i64,
    ) -> Result<FeedbackRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO feedback (id, scenario_id, author_id, body, rating, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(scenario_id)
        .bind(author_id)
        .bind(body)
        .bind(rating)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(sqlx::query_as("SELECT * FROM feedback WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn list_feedback(&self, scenario_id: &str) -> Result<Vec<FeedbackRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM feedback WHERE scenario_id = ? ORDER BY created_at DESC",
            )
            .bind(scenario_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    // ─── Gamification ───────────────────────────────────────────────────────

    pub async fn get_stats(&self, user_id: &str) -> Result<Option<UserStatsRow>> {
        Ok(sqlx::query_as("SELECT * FROM user_stats WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_badges(&self, user_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT badge FROM user_badges WHERE user_id = ? ORDER BY badge")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(b,)| b).collect())
    }

    /// Apply one XP award as a single all-or-nothing transaction:
    /// read stats → re-derive level → advance streak → evaluate badges →
    /// write stats + union badges → commit.
    ///
    /// Runs under BEGIN IMMEDIATE so two concurrent awards for the same user
    /// serialize instead of losing an update (see `begin_immediate`).
    pub async fn award_experience(
        &self,
        user_id: &str,
        delta: u64,
        curve: &LevelCurve,
        today: NaiveDate,
    ) -> Result<AwardOutcome> {
        let mut tx = self.begin_immediate().await?;
        let outcome = Self::award_in_tx(&mut tx, user_id, None, delta, curve, today).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Record a scenario completion and apply its XP award in the same
    /// transaction — a failed award never leaves an orphaned completion row.
    /// The completion insert is `INSERT OR IGNORE`, so a replayed scenario
    /// still earns XP but never grows the completed count.
    pub async fn complete_scenario_and_award(
        &self,
        user_id: &str,
        scenario_id: &str,
        delta: u64,
        curve: &LevelCurve,
        today: NaiveDate,
    ) -> Result<AwardOutcome> {
        let mut tx = self.begin_immediate().await?;
        let outcome =
            Self::award_in_tx(&mut tx, user_id, Some(scenario_id), delta, curve, today).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn award_in_tx(
        tx: &mut Transaction<'static, Sqlite>,
        user_id: &str,
        completed_scenario: Option<&str>,
        delta: u64,
        curve: &LevelCurve,
        today: NaiveDate,
    ) -> Result<AwardOutcome> {
        let now = Utc::now().to_rfc3339();
        let stats: UserStatsRow = sqlx::query_as("SELECT * FROM user_stats WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(Error::NotFound("user"))?;

        // Inserted before the completion count is read, so this award's own
        // completion feeds the badge evaluation below.
        if let Some(scenario_id) = completed_scenario {
            sqlx::query(
                "INSERT OR IGNORE INTO scenario_completions (user_id, scenario_id, completed_at)
                 VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(scenario_id)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        }

        let (completed,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scenario_completions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;
        let existing: Vec<(String,)> =
            sqlx::query_as("SELECT badge FROM user_badges WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&mut **tx)
                .await?;

        let delta = i64::try_from(delta).unwrap_or(i64::MAX);
        let experience = stats.experience.max(0).saturating_add(delta);
        let progress = level::resolve(curve, experience);
        let streak = streak::advance(stats.last_activity(), today, stats.streak.max(0) as u32);
        let earned = badges::evaluate(&StatSnapshot {
            experience: experience as u64,
            level: progress.level,
            streak,
            completed_scenarios: completed as u64,
        });

        sqlx::query(
            "UPDATE user_stats
             SET experience = ?, level = ?, streak = ?, last_activity_date = ?, updated_at = ?
             WHERE user_id = ?",
        )
        .bind(experience)
        .bind(progress.level as i64)
        .bind(streak as i64)
        .bind(today.to_string())
        .bind(&now)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        for badge in &earned {
            sqlx::query(
                "INSERT OR IGNORE INTO user_badges (user_id, badge, earned_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(badge)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        }

        let stats: UserStatsRow = sqlx::query_as("SELECT * FROM user_stats WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?;
        let all: Vec<(String,)> =
            sqlx::query_as("SELECT badge FROM user_badges WHERE user_id = ? ORDER BY badge")
                .bind(user_id)
                .fetch_all(&mut **tx)
                .await?;

        let had: std::collections::BTreeSet<&str> =
            existing.iter().map(|(b,)| b.as_str()).collect();
        let new_badges = earned
            .iter()
            .filter(|b| !had.contains(*b))
            .map(|b| b.to_string())
            .collect();

        Ok(AwardOutcome {
            stats,
            badges: all.into_iter().map(|(b,)| b).collect(),
            new_badges,
        })
    }

    /// Administrative badge cleanup: recompute the set from current stats and
    /// *replace* the stored rows — the only path that ever removes a badge.
    /// Purges badges that no longer exist in the catalog or were renamed.
    pub async fn recompute_badges(
        &self,
        user_id: &str,
        curve: &LevelCurve,
    ) -> Result<Vec<String>> {
        let mut tx = self.begin_immediate().await?;
        let stats: UserStatsRow = sqlx::query_as("SELECT * FROM user_stats WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(Error::NotFound("user"))?;
        let (completed,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scenario_completions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        let progress = level::resolve(curve, stats.experience);
        let earned = badges::evaluate(&StatSnapshot {
            experience: stats.experience.max(0) as u64,
            level: progress.level,
            streak: stats.streak.max(0) as u32,
            completed_scenarios: completed as u64,
        });

        let now = Utc::now().to_rfc3339();
        sqlx::query("DELETE FROM user_badges WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for badge in &earned {
            sqlx::query("INSERT INTO user_badges (user_id, badge, earned_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(badge)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(earned.into_iter().map(|b| b.to_string()).collect())
    }

    // ─── Goals ──────────────────────────────────────────────────────────────

    pub async fn create_goal(
        &self,
        user_id: &str,
        title: &str,
        target: f64,
        deadline: Option<&str>,
    ) -> Result<GoalRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO goals (id, user_id, title, target, progress, deadline, completed, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(title)
        .bind(target)
        .bind(deadline)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_goal(user_id, &id)
            .await?
            .ok_or(Error::NotFound("goal"))
    }

    pub async fn get_goal(&self, user_id: &str, goal_id: &str) -> Result<Option<GoalRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM goals WHERE id = ? AND user_id = ?")
                .bind(goal_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn list_goals(&self, user_id: &str) -> Result<Vec<GoalRow>> {
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM goals WHERE user_id = ? ORDER BY created_at ASC")
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await
    }

    /// Atomically add `increment` to a goal's progress and re-derive its
    /// completion flag in one UPDATE. Returns the updated row, or `None`
    /// when the goal doesn't exist (or belongs to someone else).
    pub async fn increment_goal_progress(
        &self,
        user_id: &str,
        goal_id: &str,
        increment: f64,
    ) -> Result<Option<GoalRow>> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE goals
             SET progress = progress + ?,
                 completed = CASE WHEN progress + ? >= target THEN 1 ELSE 0 END,
                 updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(increment)
        .bind(increment)
        .bind(&now)
        .bind(goal_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_goal(user_id, goal_id).await
    }

    pub async fn delete_goal(&self, user_id: &str, goal_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM goals WHERE id = ? AND user_id = ?")
            .bind(goal_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
