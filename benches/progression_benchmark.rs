// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use cotm_tracker::models::{
    ActivityCompletion, Badge, BadgeCriteria, CompletionStatus, Role, User,
};
use cotm_tracker::services::badges::{self, AchievementStats};
use cotm_tracker::services::reporting::{self, LeaderboardPeriod};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

const USERS: usize = 500;
const COMPLETIONS_PER_USER: usize = 40;

fn fixture() -> (Vec<User>, Vec<ActivityCompletion>, Vec<Badge>) {
    let now = Utc::now();
    let users: Vec<User> = (0..USERS)
        .map(|i| {
            let mut user = User::new(format!("user{i}@example.com"), format!("User {i}"));
            user.role = Role::User;
            user.total_xp = (i as u64 * 37) % 5000;
            user.level = cotm_tracker::services::progression::level_for_xp(user.total_xp);
            user
        })
        .collect();

    let completions: Vec<ActivityCompletion> = users
        .iter()
        .flat_map(|u| {
            (0..COMPLETIONS_PER_USER).map(move |j| ActivityCompletion {
                id: format!("{}-{j}", u.email),
                activity_id: format!("a{}", j % 12),
                user_email: u.email.clone(),
                status: CompletionStatus::Completed,
                score: (j % 3 == 0).then_some((60 + j * 7 % 41) as u8),
                xp_earned: 25,
                notes: None,
                file_url: None,
                completed_at: now - Duration::hours(j as i64 * 9),
            })
        })
        .collect();

    let criteria = [
        BadgeCriteria::ActivitiesCompleted,
        BadgeCriteria::TotalXp,
        BadgeCriteria::HighScoreCount,
        BadgeCriteria::PerfectScore,
        BadgeCriteria::LevelReached,
    ];
    let catalogue = (0..25)
        .map(|i| Badge {
            id: format!("b{i}"),
            name: format!("Badge {i}"),
            description: String::new(),
            icon: None,
            color: None,
            criteria_type: criteria[i % criteria.len()],
            criteria_value: (i as u64 + 1) * 3,
            is_active: true,
        })
        .collect();

    (users, completions, catalogue)
}

fn benchmark_badge_evaluation(c: &mut Criterion) {
    let (users, completions, catalogue) = fixture();
    let user = &users[USERS / 2];
    let history: Vec<ActivityCompletion> = completions
        .iter()
        .filter(|c| c.user_email == user.email)
        .cloned()
        .collect();

    c.bench_function("badge_evaluation", |b| {
        b.iter(|| {
            let stats = AchievementStats::from_history(black_box(user), black_box(&history));
            badges::newly_earned(&catalogue, &[], &stats).len()
        })
    });
}

fn benchmark_leaderboard(c: &mut Criterion) {
    let (users, completions, _) = fixture();
    let now = Utc::now();

    let mut group = c.benchmark_group("leaderboard");
    group.bench_function("all_time", |b| {
        b.iter(|| reporting::leaderboard(black_box(&users), &[], LeaderboardPeriod::All, now))
    });
    group.bench_function("weekly", |b| {
        b.iter(|| {
            reporting::leaderboard(
                black_box(&users),
                black_box(&completions),
                LeaderboardPeriod::Week,
                now,
            )
        })
    });
    group.finish();
}

criterion_group!(benches, benchmark_badge_evaluation, benchmark_leaderboard);
criterion_main!(benches);
