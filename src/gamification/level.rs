// SPDX-License-Identifier: MIT
//! Level resolver — derives the current level and progress-within-level from
//! total experience. The level is never stored independently of this
//! derivation; any persisted `level` column is a cache of `resolve(...)`.

use serde::Serialize;

use super::curve::LevelCurve;

/// Snapshot of where a given XP total sits on the curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    /// XP earned past the current level's threshold.
    pub xp_into_level: u64,
    /// Width of the current level. `None` at the capped max level.
    pub xp_for_next_level: Option<u64>,
    /// XP still needed to level up. `None` at the capped max level.
    pub xp_remaining: Option<u64>,
    /// `xp_into_level / xp_for_next_level`, clamped to [0, 1].
    /// Exactly 1.0 at the capped max level.
    pub percent: f64,
}

/// Resolve `experience` against `curve`.
///
/// Negative experience is clamped to 0 — callers that pass raw signed DB
/// values never see an error from here.
pub fn resolve(curve: &LevelCurve, experience: i64) -> LevelProgress {
    let xp = experience.max(0) as u64;

    // threshold(1) == 0 always holds, so level 1 is earned from the start.
    // Gallop to an unreachable upper bound, then binary-search the largest
    // level whose threshold is within xp; XP totals near i64::MAX sit
    // hundreds of millions of levels up a linear curve.
    let within = |level: u32| curve.threshold(level).is_some_and(|t| t <= xp);
    let mut lo = 1u32;
    let mut hi = 2u32;
    while hi < u32::MAX && within(hi) {
        lo = hi;
        hi = hi.saturating_mul(2);
    }
    if within(hi) {
        lo = hi;
    } else {
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if within(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
    }
    let level = lo;

    // Unreachable only for a malformed curve; the constructors forbid those.
    let floor = curve.threshold(level).unwrap_or(0);
    let xp_into_level = xp - floor;

    match curve.threshold(level + 1) {
        Some(ceil) => {
            let width = ceil - floor;
            let percent = if width == 0 {
                1.0
            } else {
                (xp_into_level as f64 / width as f64).clamp(0.0, 1.0)
            };
            LevelProgress {
                level,
                xp_into_level,
                xp_for_next_level: Some(width),
                xp_remaining: Some(width - xp_into_level),
                percent,
            }
        }
        None => LevelProgress {
            level,
            xp_into_level,
            xp_for_next_level: None,
            xp_remaining: None,
            percent: 1.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_xp_is_level_one() {
        let curve = LevelCurve::linear(100);
        let p = resolve(&curve, 0);
        assert_eq!(p.level, 1);
        assert_eq!(p.xp_into_level, 0);
        assert_eq!(p.xp_for_next_level, Some(100));
        assert_eq!(p.xp_remaining, Some(100));
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn negative_xp_clamps_to_zero() {
        let curve = LevelCurve::linear(100);
        assert_eq!(resolve(&curve, -50), resolve(&curve, 0));
    }

    #[test]
    fn mid_level_progress() {
        // Level 2 spans [100, 300); 150 XP is 50 into a 200-wide level.
        let curve = LevelCurve::linear(100);
        let p = resolve(&curve, 150);
        assert_eq!(p.level, 2);
        assert_eq!(p.xp_into_level, 50);
        assert_eq!(p.xp_for_next_level, Some(200));
        assert_eq!(p.xp_remaining, Some(150));
        assert!((p.percent - 0.25).abs() < 1e-9);
    }

    #[test]
    fn exact_threshold_levels_up() {
        let curve = LevelCurve::linear(100);
        assert_eq!(resolve(&curve, 99).level, 1);
        assert_eq!(resolve(&curve, 100).level, 2);
    }

    #[test]
    fn capped_max_level_is_full() {
        let curve = LevelCurve::linear_capped(100, 3);
        let p = resolve(&curve, 1_000_000);
        assert_eq!(p.level, 3);
        assert_eq!(p.xp_for_next_level, None);
        assert_eq!(p.xp_remaining, None);
        assert_eq!(p.percent, 1.0);
    }

    #[test]
    fn near_max_experience_resolves_without_overflow() {
        let curve = LevelCurve::linear(100);
        let p = resolve(&curve, i64::MAX);
        let floor = curve.threshold(p.level).unwrap();
        assert!(floor <= i64::MAX as u64);
        // The next level is either beyond this XP total or unrepresentable.
        assert!(curve
            .threshold(p.level + 1)
            .map_or(true, |t| t > i64::MAX as u64));
    }

    #[test]
    fn table_curve_resolves() {
        let curve = LevelCurve::from_table(vec![0, 50, 150, 300]).unwrap();
        assert_eq!(resolve(&curve, 49).level, 1);
        assert_eq!(resolve(&curve, 50).level, 2);
        assert_eq!(resolve(&curve, 299).level, 3);
        assert_eq!(resolve(&curve, 10_000).level, 4);
    }
}
