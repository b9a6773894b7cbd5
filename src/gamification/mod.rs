// SPDX-License-Identifier: MIT
//! Gamification core: XP curve, level resolution, streaks, badges, and the
//! services that mutate persisted stats.
//!
//! `curve`, `level`, `streak`, and `badges` are pure and synchronous; all
//! persisted `user_stats` mutations go through [`updater::GamificationService`]
//! so the `level == resolve(experience)` invariant holds after every write.

pub mod badges;
pub mod curve;
pub mod goals;
pub mod level;
pub mod streak;
pub mod updater;
