// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administration routes: catalogue and organisation management,
//! XP corrections, invitations, bulk completion, announcements and reports.
//!
//! Both `require_auth` and `require_admin` are applied in routes/mod.rs.

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::activity::default_true;
use crate::models::{
    Activity, ActivityPath, ActivityType, Badge, BadgeCriteria, Department, InvitationStatus,
    Notification, NotificationType, PendingInvitation, Priority, Role, Team, User,
};
use crate::services::completion::BulkCompletionSummary;
use crate::services::reporting::{
    self, ActivityPerformance, ComparisonReport, EmployeeReport, Overview, PathCompletionRate,
    WeeklyTrend,
};
use crate::services::{identity, progression};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Catalogue
        .route(
            "/api/admin/activities",
            get(list_activities).post(create_activity),
        )
        .route(
            "/api/admin/activities/{id}",
            put(update_activity).delete(delete_activity),
        )
        .route("/api/admin/paths", get(list_paths).post(create_path))
        .route(
            "/api/admin/paths/{id}",
            put(update_path).delete(delete_path),
        )
        .route("/api/admin/paths/{id}/order", put(reorder_path))
        .route("/api/admin/badges", get(list_badges).post(create_badge))
        .route(
            "/api/admin/badges/{id}",
            put(update_badge).delete(delete_badge),
        )
        // Organisation
        .route(
            "/api/admin/departments",
            get(list_departments).post(create_department),
        )
        .route(
            "/api/admin/departments/{id}",
            put(update_department).delete(delete_department),
        )
        .route("/api/admin/teams", get(list_teams).post(create_team))
        .route(
            "/api/admin/teams/{id}",
            put(update_team).delete(delete_team),
        )
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{email}", patch(update_user))
        .route("/api/admin/users/{email}/xp", put(correct_user_xp))
        .route(
            "/api/admin/invitations",
            get(list_invitations).post(create_invitation),
        )
        .route("/api/admin/invitations/batch", post(batch_invite))
        .route("/api/admin/invitations/{id}", delete(cancel_invitation))
        // Progress
        .route("/api/admin/completions/{id}", delete(delete_completion))
        .route("/api/admin/completions/bulk", post(bulk_complete))
        .route("/api/admin/announcements", post(send_announcement))
        // Reports
        .route("/api/admin/reports/comparison", get(comparison_report))
        .route(
            "/api/admin/reports/employees/{email}",
            get(employee_report),
        )
        .route("/api/admin/reports/activities", get(activity_report))
        .route("/api/admin/reports/overview", get(overview_report))
        .route("/api/admin/reports/trends", get(trend_report))
        .route("/api/admin/reports/paths", get(path_report))
}

/// Empty strings clear an optional reference.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ActivityRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub activity_type: ActivityType,
    #[validate(range(min = 1))]
    pub xp_value: u32,
    #[serde(default)]
    pub scoring_criteria: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub path_id: Option<String>,
    #[serde(default)]
    pub path_order: i32,
}

impl ActivityRequest {
    fn into_activity(self, id: String) -> Result<Activity> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(AppError::BadRequest(
                    "end_date must not be before start_date".to_string(),
                ));
            }
        }

        Ok(Activity {
            id,
            title: self.title.trim().to_string(),
            description: self.description,
            activity_type: self.activity_type,
            xp_value: self.xp_value,
            scoring_criteria: non_empty(self.scoring_criteria),
            video_url: non_empty(self.video_url),
            order: self.order,
            is_active: self.is_active,
            start_date: self.start_date,
            end_date: self.end_date,
            path_id: non_empty(self.path_id),
            path_order: self.path_order,
        })
    }
}

async fn ensure_path_exists(state: &AppState, path_id: Option<&str>) -> Result<()> {
    if let Some(id) = path_id {
        if state.store.get_path(id).await?.is_none() {
            return Err(AppError::BadRequest(format!("Unknown path {}", id)));
        }
    }
    Ok(())
}

async fn list_activities(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Activity>>> {
    let mut activities = state.store.list_activities().await?;
    activities.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    Ok(Json(activities))
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ActivityRequest>,
) -> Result<(StatusCode, Json<Activity>)> {
    body.validate()?;
    let activity = body.into_activity(new_id())?;
    ensure_path_exists(&state, activity.path_id.as_deref()).await?;

    state.store.upsert_activity(&activity).await?;
    tracing::info!(activity_id = %activity.id, title = %activity.title, "Activity created");
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActivityRequest>,
) -> Result<Json<Activity>> {
    body.validate()?;
    if state.store.get_activity(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Activity {}", id)));
    }
    let activity = body.into_activity(id)?;
    ensure_path_exists(&state, activity.path_id.as_deref()).await?;

    state.store.upsert_activity(&activity).await?;
    tracing::info!(activity_id = %activity.id, "Activity updated");
    Ok(Json(activity))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store.delete_activity(&id).await?;
    tracing::info!(activity_id = %id, "Activity deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Paths ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct PathRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

impl PathRequest {
    fn into_path(self, id: String) -> ActivityPath {
        ActivityPath {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            order: self.order,
            is_active: self.is_active,
            department_id: non_empty(self.department_id),
            team_id: non_empty(self.team_id),
        }
    }
}

async fn list_paths(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ActivityPath>>> {
    let mut paths = state.store.list_paths().await?;
    paths.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    Ok(Json(paths))
}

async fn create_path(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PathRequest>,
) -> Result<(StatusCode, Json<ActivityPath>)> {
    body.validate()?;
    let path = body.into_path(new_id());
    state.store.upsert_path(&path).await?;
    tracing::info!(path_id = %path.id, name = %path.name, "Path created");
    Ok((StatusCode::CREATED, Json(path)))
}

async fn update_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PathRequest>,
) -> Result<Json<ActivityPath>> {
    body.validate()?;
    if state.store.get_path(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Path {}", id)));
    }
    let path = body.into_path(id);
    state.store.upsert_path(&path).await?;
    Ok(Json(path))
}

/// Delete a path. Its activities become standalone.
async fn delete_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let members: Vec<Activity> = state
        .store
        .list_activities()
        .await?
        .into_iter()
        .filter(|a| a.path_id.as_deref() == Some(id.as_str()))
        .collect();

    for mut activity in members {
        activity.path_id = None;
        activity.path_order = 0;
        state.store.upsert_activity(&activity).await?;
    }

    state.store.delete_path(&id).await?;
    tracing::info!(path_id = %id, "Path deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub activity_ids: Vec<String>,
}

/// Rewrite the path's sequence: listed activities get `path_order` by
/// position, activities no longer listed leave the path.
async fn reorder_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ReorderRequest>,
) -> Result<Json<Vec<Activity>>> {
    if state.store.get_path(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Path {}", id)));
    }

    let all = state.store.list_activities().await?;
    let mut sequence = Vec::with_capacity(body.activity_ids.len());
    for (position, activity_id) in body.activity_ids.iter().enumerate() {
        let mut activity = all
            .iter()
            .find(|a| &a.id == activity_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;
        activity.path_id = Some(id.clone());
        activity.path_order = position as i32;
        sequence.push(activity);
    }

    for mut dropped in all.into_iter().filter(|a| {
        a.path_id.as_deref() == Some(id.as_str()) && !body.activity_ids.contains(&a.id)
    }) {
        dropped.path_id = None;
        dropped.path_order = 0;
        state.store.upsert_activity(&dropped).await?;
    }
    for activity in &sequence {
        state.store.upsert_activity(activity).await?;
    }

    tracing::info!(path_id = %id, activities = sequence.len(), "Path reordered");
    Ok(Json(sequence))
}

// ─── Badges ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct BadgeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub criteria_type: BadgeCriteria,
    pub criteria_value: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl BadgeRequest {
    fn into_badge(self, id: String) -> Result<Badge> {
        if self.criteria_type == BadgeCriteria::Unknown {
            return Err(AppError::BadRequest("Unknown criteria_type".to_string()));
        }
        Ok(Badge {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            icon: non_empty(self.icon),
            color: non_empty(self.color),
            criteria_type: self.criteria_type,
            criteria_value: self.criteria_value,
            is_active: self.is_active,
        })
    }
}

async fn list_badges(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Badge>>> {
    let mut badges = state.store.list_badges().await?;
    badges.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(badges))
}

async fn create_badge(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BadgeRequest>,
) -> Result<(StatusCode, Json<Badge>)> {
    body.validate()?;
    let badge = body.into_badge(new_id())?;
    state.store.upsert_badge(&badge).await?;
    tracing::info!(badge_id = %badge.id, criteria = ?badge.criteria_type, "Badge created");
    Ok((StatusCode::CREATED, Json(badge)))
}

/// Editing a badge never revokes awards already made.
async fn update_badge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<BadgeRequest>,
) -> Result<Json<Badge>> {
    body.validate()?;
    if state.store.get_badge(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Badge {}", id)));
    }
    let badge = body.into_badge(id)?;
    state.store.upsert_badge(&badge).await?;
    Ok(Json(badge))
}

async fn delete_badge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store.delete_badge(&id).await?;
    tracing::info!(badge_id = %id, "Badge deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Departments & Teams ─────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct DepartmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(email)]
    pub head_email: Option<String>,
}

impl DepartmentRequest {
    fn into_department(self, id: String) -> Department {
        Department {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            head_email: non_empty(self.head_email).map(|e| identity::normalize_email(&e)),
        }
    }
}

async fn list_departments(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Department>>> {
    let mut departments = state.store.list_departments().await?;
    departments.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(departments))
}

async fn create_department(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DepartmentRequest>,
) -> Result<(StatusCode, Json<Department>)> {
    body.validate()?;
    let department = body.into_department(new_id());
    state.store.upsert_department(&department).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

async fn update_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<DepartmentRequest>,
) -> Result<Json<Department>> {
    body.validate()?;
    if state.store.get_department(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Department {}", id)));
    }
    let department = body.into_department(id);
    state.store.upsert_department(&department).await?;
    Ok(Json(department))
}

async fn delete_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store.delete_department(&id).await?;
    tracing::info!(department_id = %id, "Department deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct TeamRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub lead_email: Option<String>,
}

impl TeamRequest {
    fn into_team(self, id: String) -> Team {
        Team {
            id,
            name: self.name.trim().to_string(),
            department_id: non_empty(self.department_id),
            lead_email: non_empty(self.lead_email).map(|e| identity::normalize_email(&e)),
        }
    }
}

async fn list_teams(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Team>>> {
    let mut teams = state.store.list_teams().await?;
    teams.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(teams))
}

async fn create_team(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TeamRequest>,
) -> Result<(StatusCode, Json<Team>)> {
    body.validate()?;
    let team = body.into_team(new_id());
    state.store.upsert_team(&team).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

async fn update_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TeamRequest>,
) -> Result<Json<Team>> {
    body.validate()?;
    if state.store.get_team(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Team {}", id)));
    }
    let team = body.into_team(id);
    state.store.upsert_team(&team).await?;
    Ok(Json(team))
}

async fn delete_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store.delete_team(&id).await?;
    tracing::info!(team_id = %id, "Team deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Users ───────────────────────────────────────────────────

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>> {
    let mut users = state.store.list_users().await?;
    users.sort_by(|a, b| a.email.cmp(&b.email));
    Ok(Json(users))
}

async fn load_user(state: &AppState, email: &str) -> Result<User> {
    state
        .store
        .get_user(&identity::normalize_email(email))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", email)))
}

/// Organisational fields only. An empty string clears a reference.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    let email = load_user(&state, &email).await?.email;

    let team_id = body.team_id.map(|id| non_empty(Some(id)));
    // Joining a team implies its department unless one is given.
    let implied_department = match (&team_id, &body.department_id) {
        (Some(Some(team_id)), None) => state
            .store
            .get_team(team_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Unknown team {}", team_id)))?
            .department_id,
        _ => None,
    };
    let department_id = body
        .department_id
        .map(|id| non_empty(Some(id)))
        .or(implied_department.map(Some));

    let user = state
        .completions
        .update_user(&email, move |user| {
            if let Some(role) = body.role {
                user.role = role;
            }
            if let Some(team_id) = team_id {
                user.team_id = team_id;
            }
            if let Some(department_id) = department_id {
                user.department_id = department_id;
            }
        })
        .await?;

    tracing::info!(user = %user.email, role = ?user.role, "User updated by admin");
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct CorrectXpRequest {
    pub total_xp: u64,
}

/// Set a user's XP total; the level is re-derived from it.
async fn correct_user_xp(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(email): Path<String>,
    Json(body): Json<CorrectXpRequest>,
) -> Result<Json<User>> {
    let email = load_user(&state, &email).await?.email;

    let mut previous_xp = 0;
    let corrected = state
        .completions
        .update_user(&email, |user| {
            previous_xp = user.total_xp;
            *user = progression::correct_xp(user, body.total_xp);
        })
        .await?;

    tracing::warn!(
        user = %corrected.email,
        admin = %admin.email,
        previous_xp,
        total_xp = corrected.total_xp,
        level = corrected.level,
        "XP corrected by admin"
    );
    Ok(Json(corrected))
}

// ─── Invitations ─────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct InvitationRequest {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub team_id: Option<String>,
}

async fn list_invitations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PendingInvitation>>> {
    let mut pending: Vec<PendingInvitation> = state
        .store
        .list_invitations()
        .await?
        .into_iter()
        .filter(|inv| inv.status == InvitationStatus::Pending)
        .collect();
    pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(pending))
}

async fn create_invitation(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<InvitationRequest>,
) -> Result<(StatusCode, Json<PendingInvitation>)> {
    body.validate()?;
    let invitation = identity::invite_user(
        state.store.as_ref(),
        &body.email,
        body.role,
        non_empty(body.team_id),
        &admin.email,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

#[derive(Debug, Deserialize)]
pub struct BatchInvitationRequest {
    pub invitations: Vec<InvitationRequest>,
}

/// Outcome for one row of a batch; exactly one of `invitation` and `error` is set.
#[derive(Debug, Serialize)]
pub struct BatchInvitationResult {
    pub email: String,
    pub invitation: Option<PendingInvitation>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchInvitationResponse {
    pub invited: usize,
    pub failed: usize,
    pub results: Vec<BatchInvitationResult>,
}

/// Invite every row independently. Rejected rows are reported and do not
/// stop the batch; store failures abort it.
async fn batch_invite(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<BatchInvitationRequest>,
) -> Result<Json<BatchInvitationResponse>> {
    let now = Utc::now();
    let mut results = Vec::with_capacity(body.invitations.len());

    for row in body.invitations {
        let row = InvitationRequest {
            email: row.email.trim().to_string(),
            ..row
        };
        let email = row.email.clone();
        let outcome = if email.is_empty() {
            Err("Missing email".to_string())
        } else if row.validate().is_err() {
            Err(format!("{} is not a valid email", email))
        } else {
            match identity::invite_user(
                state.store.as_ref(),
                &email,
                row.role,
                non_empty(row.team_id),
                &admin.email,
                now,
            )
            .await
            {
                Ok(invitation) => Ok(invitation),
                Err(AppError::BadRequest(msg)) => Err(msg),
                Err(AppError::NotFound(what)) => Err(format!("{} not found", what)),
                Err(e) => return Err(e),
            }
        };

        results.push(match outcome {
            Ok(invitation) => BatchInvitationResult {
                email,
                invitation: Some(invitation),
                error: None,
            },
            Err(error) => BatchInvitationResult {
                email,
                invitation: None,
                error: Some(error),
            },
        });
    }

    let invited = results.iter().filter(|r| r.invitation.is_some()).count();
    let failed = results.len() - invited;
    tracing::info!(invited, failed, invited_by = %admin.email, "Batch invitation processed");

    Ok(Json(BatchInvitationResponse {
        invited,
        failed,
        results,
    }))
}

async fn cancel_invitation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PendingInvitation>> {
    let invitation = identity::cancel_invitation(state.store.as_ref(), &id).await?;
    tracing::info!(invitation_id = %id, email = %invitation.email, "Invitation cancelled");
    Ok(Json(invitation))
}

// ─── Completions & Announcements ─────────────────────────────

/// Who an admin action applies to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
    All,
    User { email: String },
    Team { id: String },
    Department { id: String },
}

fn resolve_audience<'a>(users: &'a [User], audience: &Audience) -> Result<Vec<&'a User>> {
    let members: Vec<&User> = match audience {
        Audience::All => users.iter().collect(),
        Audience::User { email } => {
            let email = identity::normalize_email(email);
            let user = users
                .iter()
                .find(|u| u.email == email)
                .ok_or_else(|| AppError::NotFound(format!("User {}", email)))?;
            vec![user]
        }
        Audience::Team { id } => users
            .iter()
            .filter(|u| u.team_id.as_deref() == Some(id.as_str()))
            .collect(),
        Audience::Department { id } => users
            .iter()
            .filter(|u| u.department_id.as_deref() == Some(id.as_str()))
            .collect(),
    };
    Ok(members)
}

/// Remove a completion record. XP already granted is kept; use the XP
/// correction endpoint to adjust it.
async fn delete_completion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let completion = state
        .store
        .get_completion(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Completion {}", id)))?;

    state.store.delete_completion(&id).await?;
    tracing::info!(
        completion_id = %id,
        user = %completion.user_email,
        activity_id = %completion.activity_id,
        "Completion deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkCompletionRequest {
    #[validate(length(min = 1))]
    pub activity_ids: Vec<String>,
    pub target: Audience,
}

async fn bulk_complete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkCompletionRequest>,
) -> Result<Json<BulkCompletionSummary>> {
    body.validate()?;
    if matches!(body.target, Audience::All) {
        return Err(AppError::BadRequest(
            "Bulk completion needs a user, team or department".to_string(),
        ));
    }

    let users = state.store.list_users().await?;
    let emails: Vec<String> = resolve_audience(&users, &body.target)?
        .into_iter()
        .map(|u| u.email.clone())
        .collect();
    if emails.is_empty() {
        return Err(AppError::BadRequest("Target has no members".to_string()));
    }

    let summary = state
        .completions
        .bulk_complete(&emails, &body.activity_ids)
        .await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    pub audience: Audience,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub recipients: usize,
}

/// Fan an announcement out as notifications. Users who switched
/// announcements off are skipped.
async fn send_announcement(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<AnnouncementRequest>,
) -> Result<Json<AnnouncementResponse>> {
    body.validate()?;

    let users = state.store.list_users().await?;
    let now = Utc::now();
    let notifications: Vec<Notification> = resolve_audience(&users, &body.audience)?
        .into_iter()
        .filter(|u| u.notification_preferences.announcements_enabled())
        .map(|u| {
            Notification::new(
                &u.email,
                NotificationType::Announcement,
                &body.title,
                &body.message,
                now,
            )
            .with_priority(body.priority)
        })
        .collect();

    if !notifications.is_empty() {
        state.store.save_notifications(&notifications).await?;
    }

    tracing::info!(
        admin = %admin.email,
        audience = ?body.audience,
        recipients = notifications.len(),
        "Announcement sent"
    );
    Ok(Json(AnnouncementResponse {
        recipients: notifications.len(),
    }))
}

// ─── Reports ─────────────────────────────────────────────────

async fn active_activity_list(state: &AppState) -> Result<Vec<Activity>> {
    let mut activities: Vec<Activity> = state
        .store
        .list_activities()
        .await?
        .into_iter()
        .filter(|a| a.is_active)
        .collect();
    activities.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    Ok(activities)
}

async fn comparison_report(State(state): State<Arc<AppState>>) -> Result<Json<ComparisonReport>> {
    let departments = state.store.list_departments().await?;
    let teams = state.store.list_teams().await?;
    let users = state.store.list_users().await?;
    let completions = state.store.list_completions().await?;
    let activity_count = active_activity_list(&state).await?.len();

    Ok(Json(reporting::comparison_report(
        &departments,
        &teams,
        &users,
        &completions,
        activity_count,
    )))
}

async fn employee_report(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<EmployeeReport>> {
    let user = load_user(&state, &email).await?;
    let activities = active_activity_list(&state).await?;
    let completions = state.store.list_completions_for_user(&user.email).await?;

    Ok(Json(reporting::employee_report(
        &user,
        &activities,
        &completions,
    )))
}

async fn activity_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ActivityPerformance>>> {
    let activities = active_activity_list(&state).await?;
    let completions = state.store.list_completions().await?;
    let user_count = state.store.list_users().await?.len();

    Ok(Json(reporting::activity_performance(
        &activities,
        &completions,
        user_count,
    )))
}

async fn overview_report(State(state): State<Arc<AppState>>) -> Result<Json<Overview>> {
    let users = state.store.list_users().await?;
    let completions = state.store.list_completions().await?;
    let activity_count = active_activity_list(&state).await?.len();

    Ok(Json(reporting::overview(&users, &completions, activity_count)))
}

async fn trend_report(State(state): State<Arc<AppState>>) -> Result<Json<Vec<WeeklyTrend>>> {
    let completions = state.store.list_completions().await?;
    Ok(Json(reporting::weekly_trends(
        &completions,
        reporting::TREND_WEEKS,
    )))
}

async fn path_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PathCompletionRate>>> {
    let mut paths: Vec<ActivityPath> = state
        .store
        .list_paths()
        .await?
        .into_iter()
        .filter(|p| p.is_active)
        .collect();
    paths.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    let activities = active_activity_list(&state).await?;
    let completions = state.store.list_completions().await?;
    let users = state.store.list_users().await?;

    Ok(Json(reporting::path_completion_rates(
        &paths,
        &activities,
        &completions,
        &users,
    )))
}
