// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity availability and learning-path gating.
//!
//! Precedence per activity (first match wins):
//! 1. sequenced lock: the immediate predecessor in the path has no completion
//! 2. schedule window: not started yet, or already ended
//! 3. available

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Activity, ActivityCompletion, ActivityPath, User};
use crate::services::reporting::rounded_percent;

/// Whether an activity can be acted on right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Locked { predecessor_id: String },
    Upcoming { starts_at: DateTime<Utc> },
    Expired { ended_at: DateTime<Utc> },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// Short reason shown to the user when an action is rejected.
    pub fn reason(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Locked { .. } => "complete the previous activity in this path first",
            Availability::Upcoming { .. } => "this activity has not started yet",
            Availability::Expired { .. } => "this activity has ended",
        }
    }
}

/// Ids of activities the user holds at least one completion for.
pub fn completed_activity_ids(
    completions: &[ActivityCompletion],
    user_email: &str,
) -> HashSet<String> {
    completions
        .iter()
        .filter(|c| c.user_email == user_email && c.is_completed())
        .map(|c| c.activity_id.clone())
        .collect()
}

/// Activities of a path in ascending `path_order` (ties by id).
pub fn path_sequence<'a>(catalogue: &'a [Activity], path_id: &str) -> Vec<&'a Activity> {
    let mut sequence: Vec<&Activity> = catalogue
        .iter()
        .filter(|a| a.path_id.as_deref() == Some(path_id))
        .collect();
    sequence.sort_by(|a, b| a.path_order.cmp(&b.path_order).then_with(|| a.id.cmp(&b.id)));
    sequence
}

/// The activity immediately before `activity` in its path, if any.
pub fn predecessor<'a>(activity: &Activity, catalogue: &'a [Activity]) -> Option<&'a Activity> {
    let path_id = activity.path_id.as_deref()?;
    let sequence = path_sequence(catalogue, path_id);
    let position = sequence.iter().position(|a| a.id == activity.id)?;
    position.checked_sub(1).map(|prev| sequence[prev])
}

/// Evaluate availability of `activity` for a user whose completed
/// activity ids are `completed`.
///
/// `catalogue` is the set of activities the path order is computed over
/// (normally every active activity).
pub fn availability(
    activity: &Activity,
    catalogue: &[Activity],
    completed: &HashSet<String>,
    now: DateTime<Utc>,
) -> Availability {
    if let Some(prev) = predecessor(activity, catalogue) {
        if !completed.contains(&prev.id) {
            return Availability::Locked {
                predecessor_id: prev.id.clone(),
            };
        }
    }

    if let Some(starts_at) = activity.start_date {
        if now < starts_at {
            return Availability::Upcoming { starts_at };
        }
    }

    if let Some(ended_at) = activity.end_date {
        if now > ended_at {
            return Availability::Expired { ended_at };
        }
    }

    Availability::Available
}

/// Path scoping: unscoped, same team, or same department on a path
/// without a team scope.
pub fn path_visible(path: &ActivityPath, user: &User) -> bool {
    match (&path.team_id, &path.department_id) {
        (None, None) => true,
        (Some(team_id), _) => user.team_id.as_ref() == Some(team_id),
        (None, Some(department_id)) => user.department_id.as_ref() == Some(department_id),
    }
}

/// Progress through a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PathProgress {
    pub completed: u32,
    pub total: u32,
    pub percent: u32,
    pub is_complete: bool,
}

pub fn path_progress(
    path_id: &str,
    catalogue: &[Activity],
    completed: &HashSet<String>,
) -> PathProgress {
    let sequence = path_sequence(catalogue, path_id);
    let total = sequence.len() as u32;
    let done = sequence
        .iter()
        .filter(|a| completed.contains(&a.id))
        .count() as u32;

    PathProgress {
        completed: done,
        total,
        percent: rounded_percent(u64::from(done), u64::from(total)),
        is_complete: total > 0 && done == total,
    }
}
