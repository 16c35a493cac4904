// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training activity and learning path models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Kind of training activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    TrainingModule,
    Roleplay,
    ManagerCheckin,
    CallAgendaUpload,
    MicrolearningVideo,
}

impl ActivityType {
    /// Activities completed by uploading a document for AI scoring.
    pub fn is_scored(self) -> bool {
        matches!(self, ActivityType::CallAgendaUpload)
    }
}

/// Assignable unit of training, stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Document ID
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub activity_type: ActivityType,
    /// XP granted for a plain completion (upper bound for scored ones)
    pub xp_value: u32,
    /// Rubric sent to the scoring oracle for uploads
    #[serde(default)]
    pub scoring_criteria: Option<String>,
    /// Lesson URL for microlearning videos
    #[serde(default)]
    pub video_url: Option<String>,
    /// Display order on the dashboard
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Availability window (either bound optional)
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Owning learning path, if sequenced
    #[serde(default)]
    pub path_id: Option<String>,
    /// Position inside the path (ascending)
    #[serde(default)]
    pub path_order: i32,
}

/// Ordered, optionally scoped sequence of activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPath {
    /// Document ID
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Restrict to a department (ignored when `team_id` is set)
    #[serde(default)]
    pub department_id: Option<String>,
    /// Restrict to a team
    #[serde(default)]
    pub team_id: Option<String>,
}

pub(crate) fn default_true() -> bool {
    true
}
