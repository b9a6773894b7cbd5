// SPDX-License-Identifier: MIT
//! Level threshold curve — cumulative XP required to *reach* each level.
//!
//! Two construction modes:
//!
//! - **Linear**: `threshold(L) = base * (L-1) * L / 2`. With the default
//!   `base = 100` that is 0, 100, 300, 600, 1000, … Optionally capped at a
//!   max level, beyond which no amount of XP levels up.
//! - **Table**: explicit cumulative thresholds, one per level, for products
//!   that want hand-tuned pacing. Levels past the end of the table are
//!   unreachable.
//!
//! `threshold(1)` is always 0 and the curve is non-decreasing; a table that
//! violates either rule is rejected at construction, which makes a malformed
//! `[leveling]` config section fatal at startup rather than a per-request
//! surprise.

use serde::Deserialize;

use crate::error::Error;

pub const DEFAULT_BASE: u64 = 100;

/// `[leveling]` section of config.toml.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LevelingSettings {
    /// Linear curve base (default: 100). Ignored when `thresholds` is set.
    pub base: Option<u64>,
    /// Highest reachable level (default: uncapped). Ignored when `thresholds` is set.
    pub max_level: Option<u32>,
    /// Explicit cumulative thresholds per level, starting at level 1.
    /// Overrides `base`/`max_level` entirely when present.
    pub thresholds: Option<Vec<u64>>,
}

#[derive(Debug, Clone)]
pub enum LevelCurve {
    Linear { base: u64, max_level: Option<u32> },
    Table(Vec<u64>),
}

impl Default for LevelCurve {
    fn default() -> Self {
        LevelCurve::Linear {
            base: DEFAULT_BASE,
            max_level: None,
        }
    }
}

impl LevelCurve {
    /// Linear curve with the given base and no level cap.
    pub fn linear(base: u64) -> Self {
        LevelCurve::Linear {
            base,
            max_level: None,
        }
    }

    /// Linear curve capped at `max_level`.
    pub fn linear_capped(base: u64, max_level: u32) -> Self {
        LevelCurve::Linear {
            base,
            max_level: Some(max_level),
        }
    }

    /// Explicit cumulative threshold table.
    ///
    /// Fails when the table is empty, does not start at 0, or is not
    /// non-decreasing.
    pub fn from_table(thresholds: Vec<u64>) -> Result<Self, Error> {
        match thresholds.first() {
            None => {
                return Err(Error::Configuration(
                    "leveling thresholds table is empty".into(),
                ))
            }
            Some(&first) if first != 0 => {
                return Err(Error::Configuration(format!(
                    "leveling thresholds must start at 0 for level 1, got {first}"
                )))
            }
            Some(_) => {}
        }
        if let Some(w) = thresholds.windows(2).find(|w| w[1] < w[0]) {
            return Err(Error::Configuration(format!(
                "leveling thresholds must be non-decreasing, got {} after {}",
                w[1], w[0]
            )));
        }
        Ok(LevelCurve::Table(thresholds))
    }

    /// Build the curve from the `[leveling]` config section.
    pub fn from_settings(settings: &LevelingSettings) -> Result<Self, Error> {
        if let Some(table) = &settings.thresholds {
            return Self::from_table(table.clone());
        }
        let base = settings.base.unwrap_or(DEFAULT_BASE);
        if base == 0 {
            return Err(Error::Configuration(
                "leveling base must be positive".into(),
            ));
        }
        Ok(LevelCurve::Linear {
            base,
            max_level: settings.max_level,
        })
    }

    /// Cumulative XP required to reach `level`. `None` means the level is
    /// unreachable: past the cap, past the end of the table, or past the
    /// largest threshold representable in `u64` (which no XP total can meet).
    ///
    /// `level` is 1-based; `threshold(1) == Some(0)` for every valid curve.
    pub fn threshold(&self, level: u32) -> Option<u64> {
        if level == 0 {
            return Some(0);
        }
        match self {
            LevelCurve::Linear { base, max_level } => {
                if max_level.is_some_and(|max| level > max) {
                    return None;
                }
                let l = level as u64;
                // (l-1)*l fits in u64 for every u32 level; only the base
                // multiply can overflow.
                base.checked_mul((l - 1) * l / 2)
            }
            LevelCurve::Table(t) => t.get(level as usize - 1).copied(),
        }
    }
}
