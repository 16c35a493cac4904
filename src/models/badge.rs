// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Badge definitions and awarded badges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::activity::default_true;

/// Statistic a badge threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCriteria {
    ActivitiesCompleted,
    TotalXp,
    HighScoreCount,
    PerfectScore,
    StreakDays,
    LevelReached,
    /// Unrecognised criteria string from storage.
    #[serde(other)]
    Unknown,
}

/// Achievement rule configured by an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    /// Document ID
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Icon name rendered by the frontend
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub criteria_type: BadgeCriteria,
    pub criteria_value: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A badge earned by a user. At most one per (user, badge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_email: String,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
}

impl UserBadge {
    /// Document ID derived from the (user, badge) pair, so the store
    /// rejects a second award of the same badge.
    pub fn document_id(&self) -> String {
        user_badge_id(&self.user_email, &self.badge_id)
    }
}

pub fn user_badge_id(user_email: &str, badge_id: &str) -> String {
    format!(
        "{}:{}",
        urlencoding::encode(user_email),
        urlencoding::encode(badge_id)
    )
}
