// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Aggregate reporting arithmetic shared by the admin, team and leaderboard
//! views.
//!
//! All reductions are pure and division-safe: an empty input yields 0 (or
//! `None` for averages) instead of NaN.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Activity, ActivityCompletion, ActivityPath, Department, Role, Team, User};

/// Average score below which an activity is flagged as a struggle area.
pub const STRUGGLE_SCORE_THRESHOLD: u32 = 70;

/// Weeks shown in the engagement trend.
pub const TREND_WEEKS: usize = 8;

/// `round(numerator / denominator * 100)`, 0 when the denominator is 0.
pub fn rounded_percent(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return 0;
    }
    (numerator as f64 / denominator as f64 * 100.0).round() as u32
}

/// Completed completions over every (member, activity) pair.
pub fn completion_rate(completed: u64, member_count: u64, activity_count: u64) -> u32 {
    rounded_percent(completed, member_count.saturating_mul(activity_count))
}

/// Rounded mean of the scores present in `completions`; `None` when no
/// completion carries a score.
pub fn average_score<'a, I>(completions: I) -> Option<u32>
where
    I: IntoIterator<Item = &'a ActivityCompletion>,
{
    let (sum, count) = completions
        .into_iter()
        .filter_map(|c| c.score)
        .fold((0u64, 0u64), |(sum, count), s| (sum + u64::from(s), count + 1));

    (count > 0).then(|| (sum as f64 / count as f64).round() as u32)
}

/// Rounded mean of `total_xp` over `members`, 0 when empty.
pub fn average_xp(members: &[&User]) -> u64 {
    if members.is_empty() {
        return 0;
    }
    let total: u64 = members.iter().map(|u| u.total_xp).sum();
    (total as f64 / members.len() as f64).round() as u64
}

/// Metrics for one group of users.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GroupMetrics {
    pub member_count: u32,
    pub completion_rate: u32,
    pub average_score: Option<u32>,
    pub average_xp: u64,
}

pub fn group_metrics(
    members: &[&User],
    completions: &[ActivityCompletion],
    activity_count: usize,
) -> GroupMetrics {
    let emails: HashSet<&str> = members.iter().map(|u| u.email.as_str()).collect();
    let relevant: Vec<&ActivityCompletion> = completions
        .iter()
        .filter(|c| emails.contains(c.user_email.as_str()))
        .collect();
    let completed = relevant.iter().filter(|c| c.is_completed()).count() as u64;

    GroupMetrics {
        member_count: members.len() as u32,
        completion_rate: completion_rate(completed, members.len() as u64, activity_count as u64),
        average_score: average_score(relevant.iter().copied()),
        average_xp: average_xp(members),
    }
}

/// A named group's metrics in a comparison report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GroupComparison {
    pub id: String,
    pub name: String,
    pub department_id: Option<String>,
    #[serde(flatten)]
    pub metrics: GroupMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ComparisonReport {
    pub departments: Vec<GroupComparison>,
    pub teams: Vec<GroupComparison>,
}

/// Department-by-department and team-by-team metrics.
pub fn comparison_report(
    departments: &[Department],
    teams: &[Team],
    users: &[User],
    completions: &[ActivityCompletion],
    activity_count: usize,
) -> ComparisonReport {
    let departments = departments
        .iter()
        .map(|d| {
            let members: Vec<&User> = users
                .iter()
                .filter(|u| u.department_id.as_deref() == Some(d.id.as_str()))
                .collect();
            GroupComparison {
                id: d.id.clone(),
                name: d.name.clone(),
                department_id: None,
                metrics: group_metrics(&members, completions, activity_count),
            }
        })
        .collect();

    let teams = teams
        .iter()
        .map(|t| {
            let members: Vec<&User> = users
                .iter()
                .filter(|u| u.team_id.as_deref() == Some(t.id.as_str()))
                .collect();
            GroupComparison {
                id: t.id.clone(),
                name: t.name.clone(),
                department_id: t.department_id.clone(),
                metrics: group_metrics(&members, completions, activity_count),
            }
        })
        .collect();

    ComparisonReport { departments, teams }
}

// ─── Employee Report ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EmployeeActivityRow {
    pub activity_id: String,
    pub title: String,
    pub is_completed: bool,
    pub completion_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<u8>,
    pub notes: Option<String>,
    pub xp_earned: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EmployeeReport {
    pub email: String,
    pub full_name: String,
    pub total_xp: u64,
    pub level: u32,
    pub completed_count: u32,
    pub completion_rate: u32,
    pub average_score: Option<u32>,
    pub activities: Vec<EmployeeActivityRow>,
}

/// Per-activity detail for one user; each row shows the latest completion.
pub fn employee_report(
    user: &User,
    activities: &[Activity],
    completions: &[ActivityCompletion],
) -> EmployeeReport {
    let own: Vec<&ActivityCompletion> = completions
        .iter()
        .filter(|c| c.user_email == user.email)
        .collect();
    let completed_count = own.iter().filter(|c| c.is_completed()).count() as u32;

    let rows = activities
        .iter()
        .map(|activity| {
            let latest = own
                .iter()
                .filter(|c| c.activity_id == activity.id && c.is_completed())
                .max_by_key(|c| c.completed_at);
            EmployeeActivityRow {
                activity_id: activity.id.clone(),
                title: activity.title.clone(),
                is_completed: latest.is_some(),
                completion_id: latest.map(|c| c.id.clone()),
                completed_at: latest.map(|c| c.completed_at),
                score: latest.and_then(|c| c.score),
                notes: latest.and_then(|c| c.notes.clone()),
                xp_earned: latest.map(|c| c.xp_earned),
            }
        })
        .collect();

    EmployeeReport {
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        total_xp: user.total_xp,
        level: user.level,
        completed_count,
        completion_rate: completion_rate(u64::from(completed_count), 1, activities.len() as u64),
        average_score: average_score(own.iter().copied()),
        activities: rows,
    }
}

// ─── Activity Performance ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityPerformance {
    pub activity_id: String,
    pub title: String,
    /// All completion records, including re-submissions
    pub attempts: u32,
    /// Distinct users with a completion
    pub completers: u32,
    pub average_score: Option<u32>,
    /// Share of users who completed the activity
    pub completion_rate: u32,
    pub is_struggle_area: bool,
}

pub fn activity_performance(
    activities: &[Activity],
    completions: &[ActivityCompletion],
    user_count: usize,
) -> Vec<ActivityPerformance> {
    let mut by_activity: HashMap<&str, Vec<&ActivityCompletion>> = HashMap::new();
    for completion in completions.iter().filter(|c| c.is_completed()) {
        by_activity
            .entry(completion.activity_id.as_str())
            .or_default()
            .push(completion);
    }

    activities
        .iter()
        .map(|activity| {
            let rows = by_activity
                .get(activity.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let completers: HashSet<&str> = rows.iter().map(|c| c.user_email.as_str()).collect();
            let avg = average_score(rows.iter().copied());

            ActivityPerformance {
                activity_id: activity.id.clone(),
                title: activity.title.clone(),
                attempts: rows.len() as u32,
                completers: completers.len() as u32,
                average_score: avg,
                completion_rate: rounded_percent(completers.len() as u64, user_count as u64),
                is_struggle_area: avg.is_some_and(|s| s < STRUGGLE_SCORE_THRESHOLD),
            }
        })
        .collect()
}

// ─── Organisation Overview ────────────────────────────────────

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Overview {
    pub total_users: u32,
    /// Users with any XP
    pub active_users: u32,
    pub activity_count: u32,
    pub completion_rate: u32,
    pub average_score: Option<u32>,
    pub average_xp: u64,
    pub average_completions_per_user: u64,
}

pub fn overview(
    users: &[User],
    completions: &[ActivityCompletion],
    activity_count: usize,
) -> Overview {
    let members: Vec<&User> = users.iter().collect();
    let completed: Vec<&ActivityCompletion> =
        completions.iter().filter(|c| c.is_completed()).collect();
    let per_user = if users.is_empty() {
        0
    } else {
        (completed.len() as f64 / users.len() as f64).round() as u64
    };

    Overview {
        total_users: users.len() as u32,
        active_users: users.iter().filter(|u| u.total_xp > 0).count() as u32,
        activity_count: activity_count as u32,
        completion_rate: completion_rate(
            completed.len() as u64,
            users.len() as u64,
            activity_count as u64,
        ),
        average_score: average_score(completed.iter().copied()),
        average_xp: average_xp(&members),
        average_completions_per_user: per_user,
    }
}

// ─── Engagement Trend ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WeeklyTrend {
    /// Sunday starting the week (UTC)
    pub week_start: NaiveDate,
    pub completions: u32,
    pub xp_earned: u64,
    pub average_score: Option<u32>,
}

fn week_start(at: DateTime<Utc>) -> NaiveDate {
    let day = at.date_naive();
    day - Duration::days(i64::from(day.weekday().num_days_from_sunday()))
}

/// Completions grouped by week, oldest first, keeping the latest `weeks`
/// weeks that have activity.
pub fn weekly_trends(completions: &[ActivityCompletion], weeks: usize) -> Vec<WeeklyTrend> {
    let mut by_week: BTreeMap<NaiveDate, Vec<&ActivityCompletion>> = BTreeMap::new();
    for completion in completions.iter().filter(|c| c.is_completed()) {
        by_week
            .entry(week_start(completion.completed_at))
            .or_default()
            .push(completion);
    }

    let skip = by_week.len().saturating_sub(weeks);
    by_week
        .into_iter()
        .skip(skip)
        .map(|(week_start, rows)| WeeklyTrend {
            week_start,
            completions: rows.len() as u32,
            xp_earned: rows.iter().map(|c| u64::from(c.xp_earned)).sum(),
            average_score: average_score(rows.iter().copied()),
        })
        .collect()
}

// ─── Path Completion ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PathCompletionRate {
    pub path_id: String,
    pub name: String,
    /// Users holding a completion for every activity in the path
    pub completed_users: u32,
    pub total_users: u32,
    /// 0 for a path without activities
    pub completion_rate: u32,
}

pub fn path_completion_rates(
    paths: &[ActivityPath],
    activities: &[Activity],
    completions: &[ActivityCompletion],
    users: &[User],
) -> Vec<PathCompletionRate> {
    let mut done: HashMap<&str, HashSet<&str>> = HashMap::new();
    for c in completions.iter().filter(|c| c.is_completed()) {
        done.entry(c.user_email.as_str())
            .or_default()
            .insert(c.activity_id.as_str());
    }

    paths
        .iter()
        .map(|path| {
            let steps: Vec<&str> = activities
                .iter()
                .filter(|a| a.path_id.as_deref() == Some(path.id.as_str()))
                .map(|a| a.id.as_str())
                .collect();

            let completed_users = if steps.is_empty() {
                0
            } else {
                users
                    .iter()
                    .filter(|u| {
                        done.get(u.email.as_str())
                            .is_some_and(|ids| steps.iter().all(|id| ids.contains(id)))
                    })
                    .count() as u32
            };

            PathCompletionRate {
                path_id: path.id.clone(),
                name: path.name.clone(),
                completed_users,
                total_users: users.len() as u32,
                completion_rate: rounded_percent(u64::from(completed_users), users.len() as u64),
            }
        })
        .collect()
}

// ─── Leaderboard ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    #[default]
    All,
    Week,
    Month,
}

impl LeaderboardPeriod {
    /// Start of the window, or `None` for all time.
    pub fn window_start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            LeaderboardPeriod::All => None,
            LeaderboardPeriod::Week => Some(now - Duration::days(7)),
            LeaderboardPeriod::Month => Some(now - Duration::days(30)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub email: String,
    pub full_name: String,
    pub level: u32,
    pub total_xp: u64,
    /// XP earned inside the requested window (equals `total_xp` for all time)
    pub period_xp: u64,
}

/// Users ranked by XP; users with no XP in the window are left out.
pub fn leaderboard(
    users: &[User],
    completions: &[ActivityCompletion],
    period: LeaderboardPeriod,
    now: DateTime<Utc>,
) -> Vec<LeaderboardEntry> {
    let window = period.window_start(now);

    let mut period_xp: HashMap<&str, u64> = HashMap::new();
    if let Some(start) = window {
        for c in completions
            .iter()
            .filter(|c| c.is_completed() && c.completed_at >= start)
        {
            *period_xp.entry(c.user_email.as_str()).or_insert(0) += u64::from(c.xp_earned);
        }
    }

    let mut ranked: Vec<(&User, u64)> = users
        .iter()
        .map(|u| {
            let xp = match window {
                None => u.total_xp,
                Some(_) => period_xp.get(u.email.as_str()).copied().unwrap_or(0),
            };
            (u, xp)
        })
        .filter(|(_, xp)| *xp > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.email.cmp(&b.0.email)));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (u, xp))| LeaderboardEntry {
            rank: i as u32 + 1,
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            level: u.level,
            total_xp: u.total_xp,
            period_xp: xp,
        })
        .collect()
}

/// 1-based position of `email` in the all-time ordering, `None` if the
/// user is unknown.
pub fn rank_of(users: &[User], email: &str) -> Option<u32> {
    let mut sorted: Vec<&User> = users.iter().collect();
    sorted.sort_by(|a, b| b.total_xp.cmp(&a.total_xp).then_with(|| a.email.cmp(&b.email)));
    sorted
        .iter()
        .position(|u| u.email == email)
        .map(|i| i as u32 + 1)
}

// ─── Team Report ──────────────────────────────────────────────

/// Which group a lead's report covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportScope {
    Department { id: String, name: String },
    Team { id: String, name: String },
}

/// Department headship wins over team leadership. Admins fall back to
/// their own department or team.
pub fn report_scope(user: &User, departments: &[Department], teams: &[Team]) -> Option<ReportScope> {
    let headed = departments
        .iter()
        .find(|d| d.head_email.as_deref() == Some(user.email.as_str()));
    if let Some(d) = headed {
        return Some(ReportScope::Department {
            id: d.id.clone(),
            name: d.name.clone(),
        });
    }

    let led = teams
        .iter()
        .find(|t| t.lead_email.as_deref() == Some(user.email.as_str()));
    if let Some(t) = led {
        return Some(ReportScope::Team {
            id: t.id.clone(),
            name: t.name.clone(),
        });
    }

    if user.role == Role::Admin || user.role == Role::DepartmentHead {
        if let Some(d) = departments
            .iter()
            .find(|d| user.department_id.as_deref() == Some(d.id.as_str()))
        {
            return Some(ReportScope::Department {
                id: d.id.clone(),
                name: d.name.clone(),
            });
        }
    }
    if user.role.is_team_lead_or_above() {
        if let Some(t) = teams
            .iter()
            .find(|t| user.team_id.as_deref() == Some(t.id.as_str()))
        {
            return Some(ReportScope::Team {
                id: t.id.clone(),
                name: t.name.clone(),
            });
        }
    }

    None
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamMemberRow {
    pub email: String,
    pub full_name: String,
    pub level: u32,
    pub total_xp: u64,
    pub completed_count: u32,
    pub completion_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamReport {
    pub scope: ReportScope,
    pub active_members: u32,
    #[serde(flatten)]
    pub metrics: GroupMetrics,
    /// Sorted by XP, highest first
    pub members: Vec<TeamMemberRow>,
}

pub fn team_report(
    scope: ReportScope,
    users: &[User],
    completions: &[ActivityCompletion],
    activity_count: usize,
) -> TeamReport {
    let mut members: Vec<&User> = users
        .iter()
        .filter(|u| match &scope {
            ReportScope::Department { id, .. } => u.department_id.as_deref() == Some(id.as_str()),
            ReportScope::Team { id, .. } => u.team_id.as_deref() == Some(id.as_str()),
        })
        .collect();
    members.sort_by(|a, b| b.total_xp.cmp(&a.total_xp).then_with(|| a.email.cmp(&b.email)));

    let rows = members
        .iter()
        .map(|u| {
            let completed = completions
                .iter()
                .filter(|c| c.user_email == u.email && c.is_completed())
                .count() as u32;
            TeamMemberRow {
                email: u.email.clone(),
                full_name: u.full_name.clone(),
                level: u.level,
                total_xp: u.total_xp,
                completed_count: completed,
                completion_rate: completion_rate(u64::from(completed), 1, activity_count as u64),
            }
        })
        .collect();

    TeamReport {
        active_members: members.iter().filter(|u| u.total_xp > 0).count() as u32,
        metrics: group_metrics(&members, completions, activity_count),
        scope,
        members: rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompletionStatus;

    fn user(email: &str, xp: u64, team: Option<&str>, dept: Option<&str>) -> User {
        let mut u = User::new(email, email);
        u.total_xp = xp;
        u.level = crate::services::progression::level_for_xp(xp);
        u.team_id = team.map(String::from);
        u.department_id = dept.map(String::from);
        u
    }

    fn completion(
        email: &str,
        activity: &str,
        score: Option<u8>,
        xp: u32,
        at: DateTime<Utc>,
    ) -> ActivityCompletion {
        ActivityCompletion {
            id: format!("{email}-{activity}-{}", at.timestamp()),
            activity_id: activity.to_string(),
            user_email: email.to_string(),
            status: CompletionStatus::Completed,
            score,
            xp_earned: xp,
            notes: None,
            file_url: None,
            completed_at: at,
        }
    }

    #[test]
    fn test_division_safety() {
        assert_eq!(rounded_percent(5, 0), 0);
        assert_eq!(completion_rate(3, 0, 10), 0);
        assert_eq!(completion_rate(3, 10, 0), 0);
        assert_eq!(average_score(std::iter::empty()), None);
        assert_eq!(average_xp(&[]), 0);
    }

    #[test]
    fn test_completion_rate_rounds() {
        // 2 of 3 members x 2 activities.
        assert_eq!(completion_rate(2, 3, 2), 33);
        assert_eq!(completion_rate(1, 1, 8), 13); // 12.5
    }

    #[test]
    fn test_average_score_ignores_unscored() {
        let now = Utc::now();
        let rows = vec![
            completion("a", "1", Some(80), 10, now),
            completion("a", "2", None, 10, now),
            completion("a", "3", Some(95), 10, now),
        ];
        assert_eq!(average_score(&rows), Some(88)); // 87.5
    }

    #[test]
    fn test_comparison_report() {
        let now = Utc::now();
        let users = vec![
            user("a", 500, Some("t1"), Some("d1")),
            user("b", 100, Some("t1"), Some("d1")),
            user("c", 0, None, Some("d2")),
        ];
        let completions = vec![
            completion("a", "1", Some(90), 100, now),
            completion("b", "1", None, 100, now),
        ];
        let departments = vec![
            Department {
                id: "d1".into(),
                name: "Sales".into(),
                description: String::new(),
                head_email: None,
            },
            Department {
                id: "d2".into(),
                name: "Empty".into(),
                description: String::new(),
                head_email: None,
            },
        ];
        let teams = vec![Team {
            id: "t1".into(),
            name: "East".into(),
            department_id: Some("d1".into()),
            lead_email: None,
        }];

        let report = comparison_report(&departments, &teams, &users, &completions, 2);

        let sales = &report.departments[0].metrics;
        assert_eq!(sales.member_count, 2);
        assert_eq!(sales.completion_rate, 50);
        assert_eq!(sales.average_score, Some(90));
        assert_eq!(sales.average_xp, 300);

        let empty = &report.departments[1].metrics;
        assert_eq!(empty.completion_rate, 0);
        assert_eq!(empty.average_score, None);

        assert_eq!(report.teams[0].department_id.as_deref(), Some("d1"));
        assert_eq!(report.teams[0].metrics.member_count, 2);
    }

    #[test]
    fn test_leaderboard_periods() {
        let now = Utc::now();
        let users = vec![
            user("old", 2000, None, None),
            user("new", 300, None, None),
            user("zero", 0, None, None),
        ];
        let completions = vec![
            completion("old", "1", None, 2000, now - Duration::days(60)),
            completion("new", "1", None, 300, now - Duration::days(2)),
        ];

        let all = leaderboard(&users, &completions, LeaderboardPeriod::All, now);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].email, "old");
        assert_eq!(all[1].rank, 2);

        let week = leaderboard(&users, &completions, LeaderboardPeriod::Week, now);
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].email, "new");
        assert_eq!(week[0].period_xp, 300);
    }

    #[test]
    fn test_rank_of() {
        let users = vec![user("a", 10, None, None), user("b", 50, None, None)];
        assert_eq!(rank_of(&users, "b"), Some(1));
        assert_eq!(rank_of(&users, "a"), Some(2));
        assert_eq!(rank_of(&users, "nobody"), None);
    }

    #[test]
    fn test_activity_performance_flags_struggle() {
        let now = Utc::now();
        let activities = vec![Activity {
            id: "1".into(),
            title: "Agenda".into(),
            description: String::new(),
            activity_type: crate::models::ActivityType::CallAgendaUpload,
            xp_value: 200,
            scoring_criteria: None,
            video_url: None,
            order: 0,
            is_active: true,
            start_date: None,
            end_date: None,
            path_id: None,
            path_order: 0,
        }];
        let completions = vec![
            completion("a", "1", Some(50), 100, now),
            completion("a", "1", Some(70), 140, now - Duration::hours(1)),
            completion("b", "1", Some(60), 120, now),
        ];

        let perf = activity_performance(&activities, &completions, 4);
        assert_eq!(perf[0].attempts, 3);
        assert_eq!(perf[0].completers, 2);
        assert_eq!(perf[0].completion_rate, 50);
        assert_eq!(perf[0].average_score, Some(60));
        assert!(perf[0].is_struggle_area);
    }

    #[test]
    fn test_report_scope_prefers_department() {
        let lead = user("lead@example.com", 0, Some("t1"), Some("d1"));
        let departments = vec![Department {
            id: "d1".into(),
            name: "Sales".into(),
            description: String::new(),
            head_email: Some("lead@example.com".into()),
        }];
        let teams = vec![Team {
            id: "t1".into(),
            name: "East".into(),
            department_id: Some("d1".into()),
            lead_email: Some("lead@example.com".into()),
        }];

        let scope = report_scope(&lead, &departments, &teams);
        assert!(matches!(scope, Some(ReportScope::Department { .. })));

        let plain = user("x@example.com", 0, Some("t1"), Some("d1"));
        assert_eq!(report_scope(&plain, &departments, &teams), None);
    }

    #[test]
    fn test_team_report() {
        let now = Utc::now();
        let users = vec![
            user("a", 600, Some("t1"), None),
            user("b", 0, Some("t1"), None),
            user("c", 900, Some("t2"), None),
        ];
        let completions = vec![completion("a", "1", Some(100), 100, now)];
        let scope = ReportScope::Team {
            id: "t1".into(),
            name: "East".into(),
        };

        let report = team_report(scope, &users, &completions, 4);

        assert_eq!(report.metrics.member_count, 2);
        assert_eq!(report.active_members, 1);
        assert_eq!(report.metrics.completion_rate, 13); // 1 / 8
        assert_eq!(report.members[0].email, "a");
        assert_eq!(report.members[0].completion_rate, 25);
    }

    fn path_activity(id: &str, path: &str) -> Activity {
        Activity {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            activity_type: crate::models::ActivityType::TrainingModule,
            xp_value: 10,
            scoring_criteria: None,
            video_url: None,
            order: 0,
            is_active: true,
            start_date: None,
            end_date: None,
            path_id: Some(path.into()),
            path_order: 0,
        }
    }

    #[test]
    fn test_overview() {
        let now = Utc::now();
        let users = vec![
            user("a", 300, None, None),
            user("b", 0, None, None),
            user("c", 100, None, None),
        ];
        let completions = vec![
            completion("a", "1", Some(80), 100, now),
            completion("a", "2", None, 200, now),
            completion("c", "1", Some(91), 100, now),
        ];

        let o = overview(&users, &completions, 4);
        assert_eq!(o.total_users, 3);
        assert_eq!(o.active_users, 2);
        assert_eq!(o.completion_rate, 25); // 3 of 12
        assert_eq!(o.average_score, Some(86)); // 85.5
        assert_eq!(o.average_xp, 133);
        assert_eq!(o.average_completions_per_user, 1);

        let empty = overview(&[], &[], 0);
        assert_eq!(empty.completion_rate, 0);
        assert_eq!(empty.average_completions_per_user, 0);
    }

    #[test]
    fn test_weekly_trends_keep_latest_weeks() {
        // Wednesday 2026-03-04.
        let wednesday = DateTime::parse_from_rfc3339("2026-03-04T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut rows = vec![
            completion("a", "1", Some(80), 50, wednesday),
            completion("b", "1", Some(60), 30, wednesday - Duration::days(2)),
        ];
        for week in 1..=9 {
            rows.push(completion("a", "2", None, 10, wednesday - Duration::weeks(week)));
        }

        let trend = weekly_trends(&rows, TREND_WEEKS);
        assert_eq!(trend.len(), TREND_WEEKS);
        let latest = trend.last().unwrap();
        assert_eq!(latest.week_start, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(latest.completions, 2);
        assert_eq!(latest.xp_earned, 80);
        assert_eq!(latest.average_score, Some(70));
        assert_eq!(trend[0].average_score, None);
        assert!(trend.windows(2).all(|w| w[0].week_start < w[1].week_start));
    }

    #[test]
    fn test_path_completion_rates() {
        let now = Utc::now();
        let paths = vec![
            ActivityPath {
                id: "p".into(),
                name: "Onboarding".into(),
                description: String::new(),
                order: 0,
                is_active: true,
                department_id: None,
                team_id: None,
            },
            ActivityPath {
                id: "empty".into(),
                name: "Empty".into(),
                description: String::new(),
                order: 1,
                is_active: true,
                department_id: None,
                team_id: None,
            },
        ];
        let activities = vec![path_activity("s1", "p"), path_activity("s2", "p")];
        let users = vec![
            user("a", 0, None, None),
            user("b", 0, None, None),
            user("c", 0, None, None),
        ];
        let completions = vec![
            completion("a", "s1", None, 10, now),
            completion("a", "s2", None, 10, now),
            // Repeats of one step do not finish the path.
            completion("b", "s1", None, 10, now),
            completion("b", "s1", None, 10, now - Duration::hours(1)),
        ];

        let rates = path_completion_rates(&paths, &activities, &completions, &users);
        assert_eq!(rates[0].completed_users, 1);
        assert_eq!(rates[0].total_users, 3);
        assert_eq!(rates[0].completion_rate, 33);
        assert_eq!(rates[1].completed_users, 0);
        assert_eq!(rates[1].completion_rate, 0);
    }
}
