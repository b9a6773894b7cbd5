// SPDX-License-Identifier: MIT
//! User-defined goals — a small state machine independent of XP/levels.
//!
//! A goal tracks `progress` toward a positive `target`; `completed` is
//! derived (`progress >= target`) inside the same UPDATE that moves the
//! progress, so readers never see the two out of sync.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::{GoalRow, Storage};

#[derive(Clone)]
pub struct GoalService {
    storage: Arc<Storage>,
}

impl GoalService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn create(
        &self,
        user_id: &str,
        title: &str,
        target: f64,
        deadline: Option<&str>,
    ) -> Result<GoalRow> {
        if title.trim().is_empty() {
            return Err(Error::invalid("goal title must not be empty"));
        }
        if !(target > 0.0) {
            return Err(Error::invalid(format!(
                "goal target must be positive, got {target}"
            )));
        }
        if self.storage.get_user(user_id).await?.is_none() {
            return Err(Error::NotFound("user"));
        }
        self.storage
            .create_goal(user_id, title.trim(), target, deadline)
            .await
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<GoalRow>> {
        self.storage.list_goals(user_id).await
    }

    pub async fn get(&self, user_id: &str, goal_id: &str) -> Result<GoalRow> {
        self.storage
            .get_goal(user_id, goal_id)
            .await?
            .ok_or(Error::NotFound("goal"))
    }

    /// Add `increment` (default 1) to a goal's progress. Progress only moves
    /// forward; a negative increment is rejected rather than clamped.
    pub async fn update_progress(
        &self,
        user_id: &str,
        goal_id: &str,
        increment: Option<f64>,
    ) -> Result<GoalRow> {
        let increment = increment.unwrap_or(1.0);
        if !increment.is_finite() || increment < 0.0 {
            return Err(Error::invalid(format!(
                "goal increment must be a non-negative finite number, got {increment}"
            )));
        }
        self.storage
            .increment_goal_progress(user_id, goal_id, increment)
            .await?
            .ok_or(Error::NotFound("goal"))
    }

    pub async fn delete(&self, user_id: &str, goal_id: &str) -> Result<()> {
        if !self.storage.delete_goal(user_id, goal_id).await? {
            return Err(Error::NotFound("goal"));
        }
        Ok(())
    }
}
