// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Badge criteria evaluation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{ActivityCompletion, Badge, BadgeCriteria, User, UserBadge};
use crate::services::progression::level_for_xp;

/// Score at or above which a submission counts as a high score.
pub const HIGH_SCORE_THRESHOLD: u8 = 90;

/// Score counted as perfect.
pub const PERFECT_SCORE: u8 = 100;

/// Statistics badge thresholds are compared against, computed fresh from a
/// user's completion history and their updated user row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AchievementStats {
    pub completed_count: u64,
    pub high_score_count: u64,
    pub perfect_score_count: u64,
    pub current_level: u32,
    pub current_total_xp: u64,
}

impl AchievementStats {
    /// Derive stats for `user` from `completions` (other users' rows are ignored).
    pub fn from_history(user: &User, completions: &[ActivityCompletion]) -> Self {
        let mut stats = Self {
            current_level: level_for_xp(user.total_xp),
            current_total_xp: user.total_xp,
            ..Self::default()
        };

        for completion in completions
            .iter()
            .filter(|c| c.user_email == user.email && c.is_completed())
        {
            stats.completed_count += 1;
            if let Some(score) = completion.score {
                if score >= HIGH_SCORE_THRESHOLD {
                    stats.high_score_count += 1;
                }
                if score == PERFECT_SCORE {
                    stats.perfect_score_count += 1;
                }
            }
        }

        stats
    }

    /// Statistic a criteria type compares against. `None` for criteria no
    /// statistic is computed for (streaks, unknown types).
    pub fn statistic(&self, criteria: BadgeCriteria) -> Option<u64> {
        match criteria {
            BadgeCriteria::ActivitiesCompleted => Some(self.completed_count),
            BadgeCriteria::TotalXp => Some(self.current_total_xp),
            BadgeCriteria::HighScoreCount => Some(self.high_score_count),
            BadgeCriteria::PerfectScore => Some(self.perfect_score_count),
            BadgeCriteria::LevelReached => Some(u64::from(self.current_level)),
            BadgeCriteria::StreakDays | BadgeCriteria::Unknown => None,
        }
    }
}

/// Whether `badge`'s threshold is met. Never satisfied for criteria
/// without a statistic.
pub fn is_satisfied(badge: &Badge, stats: &AchievementStats) -> bool {
    stats
        .statistic(badge.criteria_type)
        .is_some_and(|value| value >= badge.criteria_value)
}

/// Active badges the user qualifies for and does not hold yet.
pub fn newly_earned<'a>(
    badges: &'a [Badge],
    earned: &[UserBadge],
    stats: &AchievementStats,
) -> Vec<&'a Badge> {
    let held: HashSet<&str> = earned.iter().map(|ub| ub.badge_id.as_str()).collect();

    badges
        .iter()
        .filter(|b| b.is_active && !held.contains(b.id.as_str()))
        .filter(|b| is_satisfied(b, stats))
        .collect()
}

/// UserBadge rows for the badges in `newly_earned`.
pub fn award(user_email: &str, badges: &[&Badge], now: DateTime<Utc>) -> Vec<UserBadge> {
    badges
        .iter()
        .map(|b| UserBadge {
            user_email: user_email.to_string(),
            badge_id: b.id.clone(),
            earned_at: now,
        })
        .collect()
}

/// Progress toward a badge for display, as a capped percentage.
pub fn badge_progress(badge: &Badge, stats: &AchievementStats) -> u32 {
    let Some(current) = stats.statistic(badge.criteria_type) else {
        return 0;
    };
    if badge.criteria_value == 0 {
        return 100;
    }
    let percent = (current as f64 / badge.criteria_value as f64 * 100.0).min(100.0);
    percent.floor() as u32
}
