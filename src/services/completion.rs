// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Completion processing service.
//!
//! Handles the core workflow:
//! 1. Load the user, the activity and the user's completion history
//! 2. Check that the activity is unlocked and inside its date window
//! 3. Score uploads through the scoring oracle
//! 4. Build a write plan (completion, XP, badges, notifications)
//! 5. Apply the plan through the entity store

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::db::EntityStore;
use crate::error::{AppError, Result};
use crate::models::{
    Activity, ActivityCompletion, Badge, CompletionStatus, Notification, NotificationType,
    Priority, User, UserBadge,
};
use crate::services::badges::{self, AchievementStats};
use crate::services::progression::{self, XpAward, XpChange};
use crate::services::scoring::{ScoringOracle, DEFAULT_RUBRIC};
use crate::services::unlock;

/// Users processed concurrently during a bulk completion.
const MAX_CONCURRENT_USERS: usize = 8;

/// Shared per-user locks type for use in AppState.
pub type UserLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// What the user handed in.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Mark done, full `xp_value`.
    Plain { notes: Option<String> },
    /// Uploaded document, XP scaled by the oracle's score.
    Scored { file_url: String, notes: Option<String> },
}

/// A badge the plan wants to award.
#[derive(Debug, Clone)]
pub struct PlannedBadge {
    pub badge: Badge,
    pub user_badge: UserBadge,
    /// Dropped with the award if the user already holds the badge.
    pub notification: Option<Notification>,
}

/// Every write a single completion causes.
#[derive(Debug, Clone)]
pub struct CompletionPlan {
    pub completion: ActivityCompletion,
    pub user: User,
    pub xp: XpChange,
    pub badges: Vec<PlannedBadge>,
    pub level_up_notification: Option<Notification>,
}

/// State after a completion has been applied.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub completion: ActivityCompletion,
    pub user: User,
    pub xp_earned: u32,
    pub leveled_up: bool,
    pub badges_awarded: Vec<Badge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Totals for an admin bulk completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkCompletionSummary {
    pub users: usize,
    pub completions_created: usize,
    pub xp_awarded: u64,
}

/// Build the write plan for `user` completing `activity`.
///
/// `history` is the user's completions before this one; `earned` the
/// badges they already hold.
#[allow(clippy::too_many_arguments)]
pub fn plan_completion(
    user: &User,
    activity: &Activity,
    award: XpAward,
    notes: Option<String>,
    file_url: Option<String>,
    history: &[ActivityCompletion],
    badge_catalogue: &[Badge],
    earned: &[UserBadge],
    now: DateTime<Utc>,
) -> CompletionPlan {
    let xp_earned = award.amount(activity.xp_value);
    let score = match award {
        XpAward::Scored(score) => Some(score),
        XpAward::Plain => None,
    };

    let completion = ActivityCompletion {
        id: uuid::Uuid::new_v4().to_string(),
        activity_id: activity.id.clone(),
        user_email: user.email.clone(),
        status: CompletionStatus::Completed,
        score,
        xp_earned,
        notes,
        file_url,
        completed_at: now,
    };

    let (updated, xp) = progression::apply_xp(user, xp_earned);

    let mut with_new = history.to_vec();
    with_new.push(completion.clone());
    let stats = AchievementStats::from_history(&updated, &with_new);

    let wants_achievements = updated.notification_preferences.achievements_enabled();
    let newly = badges::newly_earned(badge_catalogue, earned, &stats);
    let planned = badges::award(&updated.email, &newly, now)
        .into_iter()
        .zip(newly)
        .map(|(user_badge, badge)| PlannedBadge {
            notification: wants_achievements.then(|| {
                Notification::new(
                    &updated.email,
                    NotificationType::BadgeEarned,
                    "Badge earned!",
                    format!("You earned the \"{}\" badge.", badge.name),
                    now,
                )
                .with_action_url("/profile")
            }),
            badge: badge.clone(),
            user_badge,
        })
        .collect();

    let level_up_notification = (xp.leveled_up()
        && updated.notification_preferences.milestones_enabled())
    .then(|| {
        Notification::new(
            &updated.email,
            NotificationType::LevelUp,
            "Level up!",
            format!("You reached level {}.", xp.new_level),
            now,
        )
        .with_priority(Priority::High)
    });

    CompletionPlan {
        completion,
        user: updated,
        xp,
        badges: planned,
        level_up_notification,
    }
}

/// Turns user actions into applied write plans.
pub struct CompletionProcessor {
    store: Arc<dyn EntityStore>,
    scoring: Arc<dyn ScoringOracle>,
    locks: UserLocks,
}

impl CompletionProcessor {
    pub fn new(
        store: Arc<dyn EntityStore>,
        scoring: Arc<dyn ScoringOracle>,
        locks: UserLocks,
    ) -> Self {
        Self {
            store,
            scoring,
            locks,
        }
    }

    fn user_lock(&self, email: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(email.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Re-read `email`'s row under its lock, apply `mutate` and write it
    /// back. User-row writes outside a completion go through here so they
    /// cannot interleave with XP accrual.
    pub async fn update_user<F>(&self, email: &str, mutate: F) -> Result<User>
    where
        F: FnOnce(&mut User) + Send,
    {
        let lock = self.user_lock(email);
        let _guard = lock.lock().await;

        let mut user = self
            .store
            .get_user(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", email)))?;
        mutate(&mut user);
        self.store.upsert_user(&user).await?;
        Ok(user)
    }

    /// Complete `activity_id` for `email`, enforcing path order and the
    /// activity's date window.
    pub async fn complete(
        &self,
        email: &str,
        activity_id: &str,
        submission: Submission,
    ) -> Result<CompletionOutcome> {
        tracing::info!(user = email, activity_id, "Processing completion");

        let lock = self.user_lock(email);
        let _guard = lock.lock().await;

        let user = self
            .store
            .get_user(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", email)))?;

        let activity = self
            .store
            .get_activity(activity_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;

        let history = self.store.list_completions_for_user(email).await?;
        let catalogue: Vec<Activity> = self
            .store
            .list_activities()
            .await?
            .into_iter()
            .filter(|a| a.is_active)
            .collect();

        let now = Utc::now();
        let completed = unlock::completed_activity_ids(&history, email);
        let availability = unlock::availability(&activity, &catalogue, &completed, now);
        if !availability.is_available() {
            tracing::info!(
                user = email,
                activity_id,
                reason = availability.reason(),
                "Completion rejected"
            );
            return Err(AppError::ActivityUnavailable(format!(
                "{} is {}",
                activity.title,
                availability.reason()
            )));
        }

        let (award, notes, file_url, feedback) = match submission {
            Submission::Plain { notes } => {
                if activity.activity_type.is_scored() {
                    return Err(AppError::BadRequest(
                        "Activity requires a scored submission".to_string(),
                    ));
                }
                (XpAward::Plain, notes, None, None)
            }
            Submission::Scored { file_url, notes } => {
                if !activity.activity_type.is_scored() {
                    return Err(AppError::BadRequest(
                        "Activity does not accept scored submissions".to_string(),
                    ));
                }
                if file_url.trim().is_empty() {
                    return Err(AppError::BadRequest("file_url is required".to_string()));
                }

                let rubric = activity
                    .scoring_criteria
                    .as_deref()
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or(DEFAULT_RUBRIC);
                let verdict = self.scoring.score(rubric, &file_url).await?;
                let score = progression::clamp_score(verdict.score);

                tracing::info!(
                    user = email,
                    activity_id,
                    raw_score = verdict.score,
                    score,
                    "Submission scored"
                );

                // Feedback is stored as the completion's notes; the
                // submitter's own notes are appended.
                let stored_notes = match notes {
                    Some(own) if !own.trim().is_empty() => {
                        Some(format!("{}\n\n{}", verdict.feedback, own))
                    }
                    _ => Some(verdict.feedback.clone()),
                };
                (
                    XpAward::Scored(score),
                    stored_notes,
                    Some(file_url),
                    Some(verdict.feedback),
                )
            }
        };

        let badge_catalogue = self.store.list_badges().await?;
        let earned = self.store.list_user_badges(email).await?;

        let plan = plan_completion(
            &user,
            &activity,
            award,
            notes,
            file_url,
            &history,
            &badge_catalogue,
            &earned,
            now,
        );

        let mut outcome = self.apply(plan).await?;
        outcome.feedback = feedback;
        Ok(outcome)
    }

    /// Apply a plan. Badge inserts that conflict with an existing award
    /// are skipped together with their notification.
    pub async fn apply(&self, plan: CompletionPlan) -> Result<CompletionOutcome> {
        let CompletionPlan {
            completion,
            user,
            xp,
            badges,
            level_up_notification,
        } = plan;

        self.store.create_completion(&completion).await?;
        self.store.upsert_user(&user).await?;

        let mut notifications: Vec<Notification> = level_up_notification.into_iter().collect();
        let mut awarded = Vec::with_capacity(badges.len());
        for planned in badges {
            if self.store.insert_user_badge(&planned.user_badge).await? {
                tracing::info!(
                    user = %user.email,
                    badge_id = %planned.badge.id,
                    "Badge awarded"
                );
                notifications.extend(planned.notification);
                awarded.push(planned.badge);
            }
        }

        if !notifications.is_empty() {
            self.store.save_notifications(&notifications).await?;
        }

        if xp.leveled_up() {
            tracing::info!(
                user = %user.email,
                from = xp.previous_level,
                to = xp.new_level,
                "User leveled up"
            );
        }

        Ok(CompletionOutcome {
            xp_earned: completion.xp_earned,
            completion,
            user,
            leveled_up: xp.leveled_up(),
            badges_awarded: awarded,
            feedback: None,
        })
    }

    /// Admin override: mark `activity_ids` complete for every user in
    /// `emails`, skipping unlock gating and awarding the full `xp_value`.
    pub async fn bulk_complete(
        &self,
        emails: &[String],
        activity_ids: &[String],
    ) -> Result<BulkCompletionSummary> {
        let mut activities = Vec::with_capacity(activity_ids.len());
        let mut seen = HashSet::new();
        for id in activity_ids.iter().filter(|id| seen.insert(id.as_str())) {
            let activity = self
                .store
                .get_activity(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Activity {}", id)))?;
            activities.push(activity);
        }
        let badge_catalogue = self.store.list_badges().await?;

        tracing::info!(
            users = emails.len(),
            activities = activities.len(),
            "Starting bulk completion"
        );

        let per_user: Vec<_> = emails
            .iter()
            .map(|email| self.bulk_complete_user(email, &activities, &badge_catalogue))
            .collect();
        let results: Vec<Result<(usize, u64)>> = stream::iter(per_user)
            .buffer_unordered(MAX_CONCURRENT_USERS)
            .collect()
            .await;

        let mut summary = BulkCompletionSummary::default();
        for result in results {
            let (created, xp) = result?;
            summary.users += 1;
            summary.completions_created += created;
            summary.xp_awarded += xp;
        }

        tracing::info!(
            users = summary.users,
            completions = summary.completions_created,
            xp = summary.xp_awarded,
            "Bulk completion finished"
        );
        Ok(summary)
    }

    async fn bulk_complete_user(
        &self,
        email: &str,
        activities: &[Activity],
        badge_catalogue: &[Badge],
    ) -> Result<(usize, u64)> {
        let lock = self.user_lock(email);
        let _guard = lock.lock().await;

        let mut user = self
            .store
            .get_user(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", email)))?;
        let mut history = self.store.list_completions_for_user(email).await?;
        let mut earned = self.store.list_user_badges(email).await?;

        let mut xp_total = 0u64;
        for activity in activities {
            let plan = plan_completion(
                &user,
                activity,
                XpAward::Plain,
                Some("Marked complete by an administrator".to_string()),
                None,
                &history,
                badge_catalogue,
                &earned,
                Utc::now(),
            );
            earned.extend(plan.badges.iter().map(|p| p.user_badge.clone()));

            let outcome = self.apply(plan).await?;
            xp_total += u64::from(outcome.xp_earned);
            history.push(outcome.completion);
            user = outcome.user;
        }

        Ok((activities.len(), xp_total))
    }
}
