// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Access role of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
    TeamLead,
    DepartmentHead,
}

impl Role {
    /// Full access to configuration and organisation-wide reports.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Access to scoped team/department reports.
    pub fn is_team_lead_or_above(self) -> bool {
        matches!(self, Role::Admin | Role::TeamLead | Role::DepartmentHead)
    }
}

/// Per-user notification switches.
///
/// Every switch is optional: a missing value means "enabled", only an
/// explicit `false` suppresses the notification.
///
/// Only the in-app achievement, milestone and announcement switches are
/// read here. Reminder and `email_*` switches are stored for the frontend
/// and the outbound mail sender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NotificationPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inapp_achievements: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inapp_milestones: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inapp_announcements: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inapp_reminders: Option<bool>,
    // Not read by this service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_achievements: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_milestones: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_announcements: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_weekly_summary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_monthly_summary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_reminders: Option<bool>,
}

impl NotificationPreferences {
    /// In-app badge notifications.
    pub fn achievements_enabled(&self) -> bool {
        self.inapp_achievements != Some(false)
    }

    /// In-app level-up notifications.
    pub fn milestones_enabled(&self) -> bool {
        self.inapp_milestones != Some(false)
    }

    pub fn announcements_enabled(&self) -> bool {
        self.inapp_announcements != Some(false)
    }

    /// Overlay explicitly provided switches onto the stored ones.
    pub fn merge(&mut self, update: &NotificationPreferences) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if update.$field.is_some() {
                    self.$field = update.$field;
                })*
            };
        }
        overlay!(
            inapp_achievements,
            inapp_milestones,
            inapp_announcements,
            inapp_reminders,
            email_achievements,
            email_milestones,
            email_announcements,
            email_weekly_summary,
            email_monthly_summary,
            email_reminders
        );
    }
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Email address (also used as document ID)
    pub email: String,
    /// Display name
    #[serde(default)]
    pub full_name: String,
    /// Cumulative experience points
    #[serde(default)]
    pub total_xp: u64,
    /// Derived from `total_xp`, stored for list views
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
    /// Avatar background color (hex)
    #[serde(default)]
    pub avatar_color: Option<String>,
    /// When the user first signed in
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_level() -> u32 {
    1
}

impl User {
    /// A fresh level-1 user with no XP.
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            total_xp: 0,
            level: 1,
            role: Role::User,
            team_id: None,
            department_id: None,
            notification_preferences: NotificationPreferences::default(),
            avatar_color: None,
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_xp_fields_default() {
        let user: User = serde_json::from_str(r#"{"email":"a@example.com"}"#).unwrap();
        assert_eq!(user.total_xp, 0);
        assert_eq!(user.level, 1);
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::TeamLead.is_admin());
        assert!(Role::TeamLead.is_team_lead_or_above());
        assert!(Role::DepartmentHead.is_team_lead_or_above());
        assert!(!Role::User.is_team_lead_or_above());
    }

    #[test]
    fn test_role_wire_names() {
        let role: Role = serde_json::from_str("\"department_head\"").unwrap();
        assert_eq!(role, Role::DepartmentHead);
        assert_eq!(serde_json::to_string(&Role::TeamLead).unwrap(), "\"team_lead\"");
    }

    #[test]
    fn test_preferences_only_explicit_false_disables() {
        let mut prefs = NotificationPreferences::default();
        assert!(prefs.achievements_enabled());

        prefs.inapp_achievements = Some(false);
        assert!(!prefs.achievements_enabled());
        assert!(prefs.milestones_enabled());
    }

    #[test]
    fn test_preferences_merge_keeps_unset_fields() {
        let mut prefs = NotificationPreferences {
            inapp_milestones: Some(false),
            ..Default::default()
        };
        let update = NotificationPreferences {
            inapp_achievements: Some(false),
            ..Default::default()
        };

        prefs.merge(&update);

        assert_eq!(prefs.inapp_achievements, Some(false));
        assert_eq!(prefs.inapp_milestones, Some(false));
    }

    #[test]
    fn test_email_switches_stored_and_merged() {
        let mut stored: NotificationPreferences = serde_json::from_str(
            r#"{"inapp_achievements":false,"email_weekly_summary":false}"#,
        )
        .unwrap();
        let update: NotificationPreferences =
            serde_json::from_str(r#"{"email_reminders":false,"inapp_achievements":true}"#)
                .unwrap();

        stored.merge(&update);

        assert!(stored.achievements_enabled());
        assert_eq!(stored.email_weekly_summary, Some(false));
        assert_eq!(stored.email_reminders, Some(false));
        assert_eq!(stored.email_achievements, None);
        let json = serde_json::to_value(&stored).unwrap();
        assert!(json.get("email_achievements").is_none());
    }
}
