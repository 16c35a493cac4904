// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Experience accrual and level derivation.
//!
//! Levels follow a fixed staircase: level 1 starts at 0 XP and every
//! further level needs another 500 XP.

use crate::models::User;

/// Cumulative XP between consecutive levels.
pub const XP_PER_LEVEL: u64 = 500;

/// Upper bound of a scoring-oracle score.
pub const MAX_SCORE: u8 = 100;

/// Level for a cumulative XP total.
pub fn level_for_xp(total_xp: u64) -> u32 {
    u32::try_from(total_xp / XP_PER_LEVEL)
        .unwrap_or(u32::MAX)
        .saturating_add(1)
}

/// Fraction of the way to the next level, in `[0, 1)`.
pub fn level_progress(total_xp: u64) -> f64 {
    (total_xp % XP_PER_LEVEL) as f64 / XP_PER_LEVEL as f64
}

/// XP still needed to reach the next level.
pub fn xp_to_next_level(total_xp: u64) -> u64 {
    XP_PER_LEVEL - total_xp % XP_PER_LEVEL
}

/// Clamp a raw oracle score into `0..=100` and round it.
///
/// NaN is treated as 0.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, f64::from(MAX_SCORE)).round() as u8
}

/// XP for a scored submission: `round(xp_value * score / 100)`.
pub fn scored_xp(xp_value: u32, score: u8) -> u32 {
    let score = u64::from(score.min(MAX_SCORE));
    // Integer round-half-up.
    ((u64::from(xp_value) * score + 50) / 100) as u32
}

/// How much XP a completion grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XpAward {
    /// Full `xp_value`.
    Plain,
    /// Scaled by a clamped score.
    Scored(u8),
}

impl XpAward {
    pub fn amount(self, xp_value: u32) -> u32 {
        match self {
            XpAward::Plain => xp_value,
            XpAward::Scored(score) => scored_xp(xp_value, score),
        }
    }
}

/// Result of adding XP to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpChange {
    pub awarded: u32,
    pub previous_total: u64,
    pub new_total: u64,
    pub previous_level: u32,
    pub new_level: u32,
}

impl XpChange {
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.previous_level
    }
}

/// Add `awarded` XP on top of `previous_total`.
pub fn accrue(previous_total: u64, awarded: u32) -> XpChange {
    let new_total = previous_total.saturating_add(u64::from(awarded));
    XpChange {
        awarded,
        previous_total,
        new_total,
        previous_level: level_for_xp(previous_total),
        new_level: level_for_xp(new_total),
    }
}

/// Return the user row after accruing `awarded` XP, with the level
/// re-derived from the new total.
pub fn apply_xp(user: &User, awarded: u32) -> (User, XpChange) {
    let change = accrue(user.total_xp, awarded);
    let mut updated = user.clone();
    updated.total_xp = change.new_total;
    updated.level = change.new_level;
    (updated, change)
}

/// Admin correction: set an explicit total and re-derive the level.
pub fn correct_xp(user: &User, total_xp: u64) -> User {
    let mut updated = user.clone();
    updated.total_xp = total_xp;
    updated.level = level_for_xp(total_xp);
    updated
}
