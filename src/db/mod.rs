// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the entity store contract and its backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{
    Activity, ActivityCompletion, ActivityPath, Badge, Department, Notification,
    PendingInvitation, Team, User, UserBadge,
};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// Users (keyed by email)
    pub const USERS: &str = "users";
    pub const ACTIVITIES: &str = "activities";
    pub const ACTIVITY_PATHS: &str = "activity_paths";
    pub const COMPLETIONS: &str = "activity_completions";
    pub const BADGES: &str = "badges";
    /// Awarded badges (keyed by user email + badge id)
    pub const USER_BADGES: &str = "user_badges";
    pub const DEPARTMENTS: &str = "departments";
    pub const TEAMS: &str = "teams";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const INVITATIONS: &str = "pending_invitations";
}

/// Typed CRUD over the application's collections.
///
/// Lookups of a missing record return `Ok(None)`; deletes of a missing
/// record succeed.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────
    async fn get_user(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    // ─── Activities ──────────────────────────────────────────────
    async fn get_activity(&self, id: &str) -> Result<Option<Activity>, AppError>;
    async fn list_activities(&self) -> Result<Vec<Activity>, AppError>;
    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError>;
    async fn delete_activity(&self, id: &str) -> Result<(), AppError>;

    // ─── Paths ───────────────────────────────────────────────────
    async fn get_path(&self, id: &str) -> Result<Option<ActivityPath>, AppError>;
    async fn list_paths(&self) -> Result<Vec<ActivityPath>, AppError>;
    async fn upsert_path(&self, path: &ActivityPath) -> Result<(), AppError>;
    async fn delete_path(&self, id: &str) -> Result<(), AppError>;

    // ─── Completions ─────────────────────────────────────────────
    async fn get_completion(&self, id: &str) -> Result<Option<ActivityCompletion>, AppError>;
    async fn list_completions(&self) -> Result<Vec<ActivityCompletion>, AppError>;
    async fn list_completions_for_user(
        &self,
        email: &str,
    ) -> Result<Vec<ActivityCompletion>, AppError>;
    async fn create_completion(&self, completion: &ActivityCompletion) -> Result<(), AppError>;
    async fn delete_completion(&self, id: &str) -> Result<(), AppError>;

    // ─── Badges ──────────────────────────────────────────────────
    async fn get_badge(&self, id: &str) -> Result<Option<Badge>, AppError>;
    async fn list_badges(&self) -> Result<Vec<Badge>, AppError>;
    async fn upsert_badge(&self, badge: &Badge) -> Result<(), AppError>;
    async fn delete_badge(&self, id: &str) -> Result<(), AppError>;
    async fn list_user_badges(&self, email: &str) -> Result<Vec<UserBadge>, AppError>;
    /// Create-only insert. Returns `false` if the user already holds the badge.
    async fn insert_user_badge(&self, user_badge: &UserBadge) -> Result<bool, AppError>;

    // ─── Organisation ────────────────────────────────────────────
    async fn get_department(&self, id: &str) -> Result<Option<Department>, AppError>;
    async fn list_departments(&self) -> Result<Vec<Department>, AppError>;
    async fn upsert_department(&self, department: &Department) -> Result<(), AppError>;
    async fn delete_department(&self, id: &str) -> Result<(), AppError>;
    async fn get_team(&self, id: &str) -> Result<Option<Team>, AppError>;
    async fn list_teams(&self) -> Result<Vec<Team>, AppError>;
    async fn upsert_team(&self, team: &Team) -> Result<(), AppError>;
    async fn delete_team(&self, id: &str) -> Result<(), AppError>;

    // ─── Notifications ───────────────────────────────────────────
    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, AppError>;
    async fn list_notifications_for_user(
        &self,
        email: &str,
    ) -> Result<Vec<Notification>, AppError>;
    async fn upsert_notification(&self, notification: &Notification) -> Result<(), AppError>;
    /// Upsert a batch of notifications.
    async fn save_notifications(&self, notifications: &[Notification]) -> Result<(), AppError>;

    // ─── Invitations ─────────────────────────────────────────────
    async fn get_invitation(&self, id: &str) -> Result<Option<PendingInvitation>, AppError>;
    async fn list_invitations(&self) -> Result<Vec<PendingInvitation>, AppError>;
    async fn upsert_invitation(&self, invitation: &PendingInvitation) -> Result<(), AppError>;
}
