// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process entity store backed by concurrent maps.
//!
//! Used for local development (`STORE_BACKEND=memory`) and by the test suite.

use crate::db::EntityStore;
use crate::error::AppError;
use crate::models::{
    Activity, ActivityCompletion, ActivityPath, Badge, Department, Notification,
    PendingInvitation, Team, User, UserBadge,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    activities: DashMap<String, Activity>,
    paths: DashMap<String, ActivityPath>,
    completions: DashMap<String, ActivityCompletion>,
    badges: DashMap<String, Badge>,
    user_badges: DashMap<String, UserBadge>,
    departments: DashMap<String, Department>,
    teams: DashMap<String, Team>,
    notifications: DashMap<String, Notification>,
    invitations: DashMap<String, PendingInvitation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn get<T: Clone>(map: &DashMap<String, T>, id: &str) -> Option<T> {
    map.get(id).map(|entry| entry.value().clone())
}

fn values<T: Clone>(map: &DashMap<String, T>) -> Vec<T> {
    map.iter().map(|entry| entry.value().clone()).collect()
}

fn values_where<T: Clone>(map: &DashMap<String, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    map.iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| entry.value().clone())
        .collect()
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_user(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(get(&self.users, email))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(values(&self.users))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn get_activity(&self, id: &str) -> Result<Option<Activity>, AppError> {
        Ok(get(&self.activities, id))
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
        Ok(values(&self.activities))
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.activities
            .insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn delete_activity(&self, id: &str) -> Result<(), AppError> {
        self.activities.remove(id);
        Ok(())
    }

    async fn get_path(&self, id: &str) -> Result<Option<ActivityPath>, AppError> {
        Ok(get(&self.paths, id))
    }

    async fn list_paths(&self) -> Result<Vec<ActivityPath>, AppError> {
        Ok(values(&self.paths))
    }

    async fn upsert_path(&self, path: &ActivityPath) -> Result<(), AppError> {
        self.paths.insert(path.id.clone(), path.clone());
        Ok(())
    }

    async fn delete_path(&self, id: &str) -> Result<(), AppError> {
        self.paths.remove(id);
        Ok(())
    }

    async fn get_completion(&self, id: &str) -> Result<Option<ActivityCompletion>, AppError> {
        Ok(get(&self.completions, id))
    }

    async fn list_completions(&self) -> Result<Vec<ActivityCompletion>, AppError> {
        Ok(values(&self.completions))
    }

    async fn list_completions_for_user(
        &self,
        email: &str,
    ) -> Result<Vec<ActivityCompletion>, AppError> {
        Ok(values_where(&self.completions, |c| c.user_email == email))
    }

    async fn create_completion(&self, completion: &ActivityCompletion) -> Result<(), AppError> {
        self.completions
            .insert(completion.id.clone(), completion.clone());
        Ok(())
    }

    async fn delete_completion(&self, id: &str) -> Result<(), AppError> {
        self.completions.remove(id);
        Ok(())
    }

    async fn get_badge(&self, id: &str) -> Result<Option<Badge>, AppError> {
        Ok(get(&self.badges, id))
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, AppError> {
        Ok(values(&self.badges))
    }

    async fn upsert_badge(&self, badge: &Badge) -> Result<(), AppError> {
        self.badges.insert(badge.id.clone(), badge.clone());
        Ok(())
    }

    async fn delete_badge(&self, id: &str) -> Result<(), AppError> {
        self.badges.remove(id);
        Ok(())
    }

    async fn list_user_badges(&self, email: &str) -> Result<Vec<UserBadge>, AppError> {
        Ok(values_where(&self.user_badges, |ub| ub.user_email == email))
    }

    async fn insert_user_badge(&self, user_badge: &UserBadge) -> Result<bool, AppError> {
        match self.user_badges.entry(user_badge.document_id()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(user_badge.clone());
                Ok(true)
            }
        }
    }

    async fn get_department(&self, id: &str) -> Result<Option<Department>, AppError> {
        Ok(get(&self.departments, id))
    }

    async fn list_departments(&self) -> Result<Vec<Department>, AppError> {
        Ok(values(&self.departments))
    }

    async fn upsert_department(&self, department: &Department) -> Result<(), AppError> {
        self.departments
            .insert(department.id.clone(), department.clone());
        Ok(())
    }

    async fn delete_department(&self, id: &str) -> Result<(), AppError> {
        self.departments.remove(id);
        Ok(())
    }

    async fn get_team(&self, id: &str) -> Result<Option<Team>, AppError> {
        Ok(get(&self.teams, id))
    }

    async fn list_teams(&self) -> Result<Vec<Team>, AppError> {
        Ok(values(&self.teams))
    }

    async fn upsert_team(&self, team: &Team) -> Result<(), AppError> {
        self.teams.insert(team.id.clone(), team.clone());
        Ok(())
    }

    async fn delete_team(&self, id: &str) -> Result<(), AppError> {
        self.teams.remove(id);
        Ok(())
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, AppError> {
        Ok(get(&self.notifications, id))
    }

    async fn list_notifications_for_user(
        &self,
        email: &str,
    ) -> Result<Vec<Notification>, AppError> {
        Ok(values_where(&self.notifications, |n| n.user_email == email))
    }

    async fn upsert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    async fn save_notifications(&self, notifications: &[Notification]) -> Result<(), AppError> {
        for notification in notifications {
            self.notifications
                .insert(notification.id.clone(), notification.clone());
        }
        Ok(())
    }

    async fn get_invitation(&self, id: &str) -> Result<Option<PendingInvitation>, AppError> {
        Ok(get(&self.invitations, id))
    }

    async fn list_invitations(&self) -> Result<Vec<PendingInvitation>, AppError> {
        Ok(values(&self.invitations))
    }

    async fn upsert_invitation(&self, invitation: &PendingInvitation) -> Result<(), AppError> {
        self.invitations
            .insert(invitation.id.clone(), invitation.clone());
        Ok(())
    }
}
