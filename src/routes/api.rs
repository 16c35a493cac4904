// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{
    Activity, ActivityCompletion, ActivityPath, Badge, Notification, NotificationPreferences,
    User,
};
use crate::services::badges::{self, AchievementStats};
use crate::services::completion::{CompletionOutcome, Submission};
use crate::services::progression;
use crate::services::reporting::{self, LeaderboardEntry, LeaderboardPeriod, TeamReport};
use crate::services::unlock::{self, Availability, PathProgress};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).patch(update_me))
        .route("/api/activities", get(get_activities))
        .route("/api/activities/{id}/complete", post(complete_activity))
        .route("/api/activities/{id}/submit", post(submit_activity))
        .route("/api/completions", get(get_completions))
        .route("/api/paths", get(get_paths))
        .route("/api/badges", get(get_badges))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/notifications", get(get_notifications))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/team/report", get(get_team_report))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    /// Fraction of the current level already earned, in `[0, 1)`
    pub level_progress: f64,
    pub xp_to_next_level: u64,
    /// All-time leaderboard position
    pub rank: Option<u32>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<MeResponse>> {
    let users = state.store.list_users().await?;

    Ok(Json(MeResponse {
        level_progress: progression::level_progress(user.total_xp),
        xp_to_next_level: progression::xp_to_next_level(user.total_xp),
        rank: reporting::rank_of(&users, &user.email),
        user,
    }))
}

#[derive(Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    pub notification_preferences: Option<NotificationPreferences>,
    #[validate(length(max = 16))]
    pub avatar_color: Option<String>,
}

/// Update profile fields the user owns. XP, level, role and team are
/// not writable here.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<User>> {
    body.validate()?;

    let user = state
        .completions
        .update_user(&user.email, move |user| {
            if let Some(full_name) = body.full_name {
                user.full_name = full_name.trim().to_string();
            }
            if let Some(prefs) = &body.notification_preferences {
                user.notification_preferences.merge(prefs);
            }
            if let Some(color) = body.avatar_color {
                user.avatar_color = Some(color);
            }
        })
        .await?;
    tracing::info!(user = %user.email, "Profile updated");
    Ok(Json(user))
}

// ─── Activities ──────────────────────────────────────────────

/// An activity as seen by the current user.
#[derive(Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub availability: Availability,
    pub is_completed: bool,
    pub completion_count: u32,
    pub best_score: Option<u8>,
}

fn active_activities(all: Vec<Activity>) -> Vec<Activity> {
    let mut active: Vec<Activity> = all.into_iter().filter(|a| a.is_active).collect();
    active.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    active
}

async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<ActivityView>>> {
    let catalogue = active_activities(state.store.list_activities().await?);
    let history = state.store.list_completions_for_user(&user.email).await?;
    let completed = unlock::completed_activity_ids(&history, &user.email);
    let now = Utc::now();

    let views = catalogue
        .iter()
        .map(|activity| {
            let own: Vec<&ActivityCompletion> = history
                .iter()
                .filter(|c| c.activity_id == activity.id && c.is_completed())
                .collect();
            ActivityView {
                availability: unlock::availability(activity, &catalogue, &completed, now),
                is_completed: !own.is_empty(),
                completion_count: own.len() as u32,
                best_score: own.iter().filter_map(|c| c.score).max(),
                activity: activity.clone(),
            }
        })
        .collect();

    Ok(Json(views))
}

#[derive(Deserialize, Default)]
pub struct CompleteRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

async fn complete_activity(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: Option<Json<CompleteRequest>>,
) -> Result<Json<CompletionOutcome>> {
    let notes = body.and_then(|Json(b)| b.notes);
    let outcome = state
        .completions
        .complete(&user.email, &id, Submission::Plain { notes })
        .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize, Validate)]
pub struct SubmitRequest {
    #[validate(length(min = 1, max = 2048))]
    pub file_url: String,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn submit_activity(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<CompletionOutcome>> {
    body.validate()?;
    let outcome = state
        .completions
        .complete(
            &user.email,
            &id,
            Submission::Scored {
                file_url: body.file_url,
                notes: body.notes,
            },
        )
        .await?;
    Ok(Json(outcome))
}

// ─── Completion History ──────────────────────────────────────

/// Position after the last completion of a page: newest first, ties by id.
#[derive(Debug, Clone, PartialEq)]
struct CompletionCursor {
    completed_at: DateTime<Utc>,
    id: String,
}

#[derive(Deserialize)]
pub struct CompletionsQuery {
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Parse the opaque cursor string returned by a previous page.
fn parse_cursor(cursor: Option<&str>) -> Result<Option<CompletionCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor = || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;
            let parts: Vec<&str> = decoded_str.splitn(3, ':').collect();
            if parts.len() != 3 || parts[2].is_empty() {
                return Err(invalid_cursor());
            }

            let seconds = parts[0].parse::<i64>().map_err(|_| invalid_cursor())?;
            let nanos = parts[1].parse::<u32>().map_err(|_| invalid_cursor())?;
            let completed_at =
                DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid_cursor)?;

            Ok(CompletionCursor {
                completed_at,
                id: parts[2].to_string(),
            })
        })
        .transpose()
}

fn encode_cursor(cursor: &CompletionCursor) -> String {
    let raw = format!(
        "{}:{}:{}",
        cursor.completed_at.timestamp(),
        cursor.completed_at.timestamp_subsec_nanos(),
        cursor.id
    );
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

#[derive(Serialize)]
pub struct CompletionsResponse {
    pub completions: Vec<ActivityCompletion>,
    pub next_cursor: Option<String>,
}

async fn get_completions(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<CompletionsQuery>,
) -> Result<Json<CompletionsResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let cursor = parse_cursor(params.cursor.as_deref())?;

    let mut completions = state.store.list_completions_for_user(&user.email).await?;
    completions.sort_by(|a, b| {
        b.completed_at
            .cmp(&a.completed_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    let mut page: Vec<ActivityCompletion> = completions
        .into_iter()
        .filter(|c| match &cursor {
            Some(after) => (c.completed_at, &c.id) < (after.completed_at, &after.id),
            None => true,
        })
        .take(limit + 1)
        .collect();

    let next_cursor = if page.len() > limit {
        page.truncate(limit);
        page.last().map(|c| {
            encode_cursor(&CompletionCursor {
                completed_at: c.completed_at,
                id: c.id.clone(),
            })
        })
    } else {
        None
    };

    Ok(Json(CompletionsResponse {
        completions: page,
        next_cursor,
    }))
}

// ─── Learning Paths ──────────────────────────────────────────

#[derive(Serialize)]
pub struct PathActivityView {
    pub id: String,
    pub title: String,
    pub path_order: i32,
    pub xp_value: u32,
    pub availability: Availability,
    pub is_completed: bool,
}

#[derive(Serialize)]
pub struct PathView {
    #[serde(flatten)]
    pub path: ActivityPath,
    pub progress: PathProgress,
    pub activities: Vec<PathActivityView>,
}

async fn get_paths(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<PathView>>> {
    let catalogue = active_activities(state.store.list_activities().await?);
    let history = state.store.list_completions_for_user(&user.email).await?;
    let completed = unlock::completed_activity_ids(&history, &user.email);
    let now = Utc::now();

    let mut paths: Vec<ActivityPath> = state
        .store
        .list_paths()
        .await?
        .into_iter()
        .filter(|p| p.is_active && unlock::path_visible(p, &user))
        .collect();
    paths.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));

    let views = paths
        .into_iter()
        .map(|path| {
            let activities = unlock::path_sequence(&catalogue, &path.id)
                .into_iter()
                .map(|a| PathActivityView {
                    id: a.id.clone(),
                    title: a.title.clone(),
                    path_order: a.path_order,
                    xp_value: a.xp_value,
                    availability: unlock::availability(a, &catalogue, &completed, now),
                    is_completed: completed.contains(&a.id),
                })
                .collect();
            PathView {
                progress: unlock::path_progress(&path.id, &catalogue, &completed),
                activities,
                path,
            }
        })
        .collect();

    Ok(Json(views))
}

// ─── Badges ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EarnedBadge {
    #[serde(flatten)]
    pub badge: Badge,
    pub earned_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct BadgeProgressView {
    #[serde(flatten)]
    pub badge: Badge,
    /// Capped percentage toward the threshold
    pub progress: u32,
}

#[derive(Serialize)]
pub struct BadgesResponse {
    pub stats: AchievementStats,
    pub earned: Vec<EarnedBadge>,
    pub in_progress: Vec<BadgeProgressView>,
}

async fn get_badges(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<BadgesResponse>> {
    let catalogue = state.store.list_badges().await?;
    let held = state.store.list_user_badges(&user.email).await?;
    let history = state.store.list_completions_for_user(&user.email).await?;
    let stats = AchievementStats::from_history(&user, &history);

    let mut earned: Vec<EarnedBadge> = held
        .iter()
        .filter_map(|ub| {
            catalogue
                .iter()
                .find(|b| b.id == ub.badge_id)
                .map(|b| EarnedBadge {
                    badge: b.clone(),
                    earned_at: ub.earned_at,
                })
        })
        .collect();
    earned.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));

    let in_progress = catalogue
        .iter()
        .filter(|b| b.is_active && !held.iter().any(|ub| ub.badge_id == b.id))
        .map(|b| BadgeProgressView {
            progress: badges::badge_progress(b, &stats),
            badge: b.clone(),
        })
        .collect();

    Ok(Json(BadgesResponse {
        stats,
        earned,
        in_progress,
    }))
}

// ─── Leaderboard ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    period: LeaderboardPeriod,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardResponse {
    pub period: LeaderboardPeriod,
    pub entries: Vec<LeaderboardEntry>,
    /// The caller's position in `entries`, if ranked
    pub my_rank: Option<u32>,
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>> {
    let users = state.store.list_users().await?;
    let completions = match params.period {
        LeaderboardPeriod::All => Vec::new(),
        _ => state.store.list_completions().await?,
    };

    let entries = reporting::leaderboard(&users, &completions, params.period, Utc::now());
    let my_rank = entries
        .iter()
        .find(|e| e.email == user.email)
        .map(|e| e.rank);

    Ok(Json(LeaderboardResponse {
        period: params.period,
        entries,
        my_rank,
    }))
}

// ─── Notifications ───────────────────────────────────────────

async fn get_notifications(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Notification>>> {
    let mut notifications = state.store.list_notifications_for_user(&user.email).await?;
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(notifications))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    // Someone else's notification is reported as missing.
    let mut notification = state
        .store
        .get_notification(&id)
        .await?
        .filter(|n| n.user_email == user.email)
        .ok_or_else(|| AppError::NotFound(format!("Notification {}", id)))?;

    if !notification.is_read {
        notification.is_read = true;
        state.store.upsert_notification(&notification).await?;
    }
    Ok(Json(notification))
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<MarkAllReadResponse>> {
    let unread: Vec<Notification> = state
        .store
        .list_notifications_for_user(&user.email)
        .await?
        .into_iter()
        .filter(|n| !n.is_read)
        .map(|mut n| {
            n.is_read = true;
            n
        })
        .collect();

    if !unread.is_empty() {
        state.store.save_notifications(&unread).await?;
    }

    Ok(Json(MarkAllReadResponse {
        updated: unread.len(),
    }))
}

// ─── Team Report ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TeamReportQuery {
    /// Admins may pick any team or department
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    department_id: Option<String>,
}

async fn get_team_report(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<TeamReportQuery>,
) -> Result<Json<TeamReport>> {
    if !user.role.is_team_lead_or_above() {
        return Err(AppError::Forbidden);
    }

    let departments = state.store.list_departments().await?;
    let teams = state.store.list_teams().await?;

    let requested = if user.role.is_admin() {
        match (&params.team_id, &params.department_id) {
            (Some(id), _) => Some(
                teams
                    .iter()
                    .find(|t| &t.id == id)
                    .map(|t| reporting::ReportScope::Team {
                        id: t.id.clone(),
                        name: t.name.clone(),
                    })
                    .ok_or_else(|| AppError::NotFound(format!("Team {}", id)))?,
            ),
            (None, Some(id)) => Some(
                departments
                    .iter()
                    .find(|d| &d.id == id)
                    .map(|d| reporting::ReportScope::Department {
                        id: d.id.clone(),
                        name: d.name.clone(),
                    })
                    .ok_or_else(|| AppError::NotFound(format!("Department {}", id)))?,
            ),
            (None, None) => None,
        }
    } else {
        None
    };

    let scope = requested
        .or_else(|| reporting::report_scope(&user, &departments, &teams))
        .ok_or_else(|| AppError::NotFound("No team or department to report on".to_string()))?;

    let users = state.store.list_users().await?;
    let completions = state.store.list_completions().await?;
    let activity_count = active_activities(state.store.list_activities().await?).len();

    Ok(Json(reporting::team_report(
        scope,
        &users,
        &completions,
        activity_count,
    )))
}
