// SPDX-License-Identifier: MIT
//! Gamification updater — the only write path for `user_stats`.
//!
//! Every XP-earning event (scenario completion, self-assessment submission)
//! funnels through [`GamificationService::award`], which validates the delta
//! and hands the storage layer one all-or-nothing transaction: add XP,
//! re-derive the level, advance the streak, union newly earned badges.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::gamification::curve::LevelCurve;
use crate::gamification::level::{self, LevelProgress};
use crate::storage::{AwardOutcome, Storage};

/// Client-facing view of a user's gamification state.
#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    pub user_id: String,
    pub experience: i64,
    pub level: u32,
    pub streak: u32,
    pub last_activity_date: Option<String>,
    pub progress: LevelProgress,
    pub badges: Vec<String>,
    /// Badges first earned by the award that produced this view.
    /// Empty for plain reads.
    pub new_badges: Vec<String>,
}

#[derive(Clone)]
pub struct GamificationService {
    storage: Arc<Storage>,
    curve: Arc<LevelCurve>,
    /// XP for completing a scenario when the scenario has no override.
    pub scenario_xp: u64,
    /// XP for submitting a self-assessment.
    pub assessment_xp: u64,
}

impl GamificationService {
    pub fn new(
        storage: Arc<Storage>,
        curve: Arc<LevelCurve>,
        scenario_xp: u64,
        assessment_xp: u64,
    ) -> Self {
        Self {
            storage,
            curve,
            scenario_xp,
            assessment_xp,
        }
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    /// Award `delta` XP to a user, dated "today" in UTC.
    ///
    /// Rejects negative deltas with `InvalidArgument` before touching
    /// storage; absent users surface as `NotFound`.
    pub async fn award(&self, user_id: &str, delta: i64) -> Result<StatsView> {
        self.award_on(user_id, delta, Utc::now().date_naive()).await
    }

    /// Like [`award`](Self::award) with an explicit activity date.
    /// Exists so streak behavior is testable without a clock.
    pub async fn award_on(&self, user_id: &str, delta: i64, today: NaiveDate) -> Result<StatsView> {
        if delta < 0 {
            return Err(Error::invalid(format!(
                "experience delta must be non-negative, got {delta}"
            )));
        }
        let outcome = self
            .storage
            .award_experience(user_id, delta as u64, &self.curve, today)
            .await?;
        Ok(self.view_from(outcome))
    }

    /// Record a scenario completion and award its XP. The completion row and
    /// the award commit in one transaction; a replayed scenario still earns
    /// XP but never grows the completed count.
    pub async fn complete_scenario(&self, user_id: &str, scenario_id: &str) -> Result<StatsView> {
        let scenario = self
            .storage
            .get_scenario(scenario_id)
            .await?
            .ok_or(Error::NotFound("scenario"))?;
        let xp = scenario
            .xp_reward
            .map(|xp| xp.max(0) as u64)
            .unwrap_or(self.scenario_xp);
        let outcome = self
            .storage
            .complete_scenario_and_award(user_id, scenario_id, xp, &self.curve, Utc::now().date_naive())
            .await?;
        Ok(self.view_from(outcome))
    }

    /// Current stats without any mutation.
    pub async fn stats(&self, user_id: &str) -> Result<StatsView> {
        let stats = self
            .storage
            .get_stats(user_id)
            .await?
            .ok_or(Error::NotFound("user"))?;
        let badges = self.storage.list_badges(user_id).await?;
        let progress = level::resolve(&self.curve, stats.experience);
        Ok(StatsView {
            user_id: stats.user_id.clone(),
            experience: stats.experience,
            level: progress.level,
            streak: stats.streak.max(0) as u32,
            last_activity_date: stats.last_activity_date.clone(),
            progress,
            badges,
            new_badges: Vec::new(),
        })
    }

    /// Administrative cleanup: recompute the badge set from scratch and
    /// replace the stored one. Unlike the award path this *removes* badges
    /// whose criteria no longer hold a definition in the catalog.
    pub async fn recompute_badges(&self, user_id: &str) -> Result<Vec<String>> {
        let badges = self.storage.recompute_badges(user_id, &self.curve).await?;
        info!(user_id, count = badges.len(), "badge set recomputed");
        Ok(badges)
    }

    fn view_from(&self, outcome: AwardOutcome) -> StatsView {
        if !outcome.new_badges.is_empty() {
            info!(
                user_id = %outcome.stats.user_id,
                badges = ?outcome.new_badges,
                "badges earned"
            );
        }
        let progress = level::resolve(&self.curve, outcome.stats.experience);
        StatsView {
            user_id: outcome.stats.user_id.clone(),
            experience: outcome.stats.experience,
            level: progress.level,
            streak: outcome.stats.streak.max(0) as u32,
            last_activity_date: outcome.stats.last_activity_date.clone(),
            progress,
            badges: outcome.badges,
            new_badges: outcome.new_badges,
        }
    }
}
