// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Organisational grouping: departments, teams and pending invitations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::user::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    /// Document ID
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Department head, sees the department report
    #[serde(default)]
    pub head_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Document ID
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub department_id: Option<String>,
    /// Team lead, sees the team report
    #[serde(default)]
    pub lead_email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Cancelled,
}

/// Invitation recorded when an admin invites someone who has not signed in yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInvitation {
    /// Document ID
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub team_id: Option<String>,
    pub invited_by: String,
    #[serde(default)]
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
}
