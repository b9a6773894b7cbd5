// SPDX-License-Identifier: MIT
//! Badge catalog and evaluator.
//!
//! The catalog is a process-wide constant table — badges are product
//! configuration, not user data. Evaluation is a pure function of the user's
//! current stats and is idempotent; the caller unions the result into the
//! persisted badge set. Badges are never removed by the normal award path;
//! the administrative recompute operation replaces the set from scratch to
//! purge stale or renamed badges.

use std::collections::BTreeSet;

/// The stat values badge criteria are allowed to look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatSnapshot {
    pub experience: u64,
    pub level: u32,
    pub streak: u32,
    pub completed_scenarios: u64,
}

pub struct Badge {
    pub name: &'static str,
    pub criterion: fn(&StatSnapshot) -> bool,
}

/// Fixed badge catalog, checked in order. Extend by appending — renaming an
/// existing badge strands earned rows until an admin recompute.
pub static CATALOG: &[Badge] = &[
    Badge {
        name: "Getting Started",
        criterion: |s| s.completed_scenarios >= 1,
    },
    Badge {
        name: "Consistent Learner",
        criterion: |s| s.completed_scenarios >= 5,
    },
    Badge {
        name: "Streak Master",
        criterion: |s| s.streak >= 5,
    },
    Badge {
        name: "XP Warrior",
        criterion: |s| s.experience >= 100,
    },
    Badge {
        name: "XP Veteran",
        criterion: |s| s.experience >= 5_000,
    },
    Badge {
        name: "XP Legend",
        criterion: |s| s.experience >= 10_000,
    },
    Badge {
        name: "Level 10 Achiever",
        criterion: |s| s.level >= 10,
    },
];

/// All badge names the given stats qualify for.
pub fn evaluate(stats: &StatSnapshot) -> BTreeSet<&'static str> {
    CATALOG
        .iter()
        .filter(|b| (b.criterion)(stats))
        .map(|b| b.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_earn_nothing() {
        assert!(evaluate(&StatSnapshot::default()).is_empty());
    }

    #[test]
    fn xp_warrior_without_level_badge() {
        let stats = StatSnapshot {
            experience: 150,
            level: 1,
            streak: 0,
            completed_scenarios: 0,
        };
        let earned = evaluate(&stats);
        assert!(earned.contains("XP Warrior"));
        assert!(!earned.contains("Level 10 Achiever"));
        assert!(!earned.contains("XP Veteran"));
    }

    #[test]
    fn completion_tiers() {
        let one = StatSnapshot {
            completed_scenarios: 1,
            ..Default::default()
        };
        assert!(evaluate(&one).contains("Getting Started"));
        assert!(!evaluate(&one).contains("Consistent Learner"));

        let five = StatSnapshot {
            completed_scenarios: 5,
            ..Default::default()
        };
        assert!(evaluate(&five).contains("Consistent Learner"));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let stats = StatSnapshot {
            experience: 10_000,
            level: 12,
            streak: 7,
            completed_scenarios: 20,
        };
        assert_eq!(evaluate(&stats), evaluate(&stats));
        // Everything in the catalog qualifies at these stats.
        assert_eq!(evaluate(&stats).len(), CATALOG.len());
    }

    #[test]
    fn catalog_names_are_unique() {
        let names: BTreeSet<_> = CATALOG.iter().map(|b| b.name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }
}
