// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity completion records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    #[default]
    Completed,
    /// Any status written by other tools; never counted as completed.
    #[serde(other)]
    Other,
}

/// A user finished (or re-finished) an activity.
///
/// Completions are append-only; a user may hold several for the same
/// activity after re-submitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCompletion {
    /// Document ID
    pub id: String,
    pub activity_id: String,
    pub user_email: String,
    #[serde(default)]
    pub status: CompletionStatus,
    /// Clamped AI score (0-100), only for scored uploads
    #[serde(default)]
    pub score: Option<u8>,
    pub xp_earned: u32,
    /// Scoring feedback or free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Uploaded document, for scored submissions
    #[serde(default)]
    pub file_url: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl ActivityCompletion {
    pub fn is_completed(&self) -> bool {
        self.status == CompletionStatus::Completed
    }
}
