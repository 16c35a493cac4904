// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end progression flows over the in-memory store.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use cotm_tracker::db::EntityStore;
use cotm_tracker::models::{
    ActivityCompletion, ActivityType, BadgeCriteria, CompletionStatus, Department, Role, Team,
};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{
    activity, create_test_app, create_test_app_with, get, json_body, seed_activity, seed_badge,
    seed_user, send_json, FailingOracle, FixedScore,
};

/// A rejected completion leaves no record and no XP behind.
async fn assert_nothing_written(state: &cotm_tracker::AppState, email: &str, total_xp: u64) {
    assert!(state
        .store
        .list_completions_for_user(email)
        .await
        .unwrap()
        .is_empty());
    let user = state.store.get_user(email).await.unwrap().unwrap();
    assert_eq!(user.total_xp, total_xp);
    assert!(state
        .store
        .list_notifications_for_user(email)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_complete_activity_levels_up() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 480).await;
    seed_activity(&state, activity("intro", ActivityType::TrainingModule, 100)).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/activities/intro/complete",
            "rep@example.com",
            json!({"notes": "done"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["xp_earned"], 100);
    assert_eq!(body["leveled_up"], true);
    assert_eq!(body["user"]["total_xp"], 580);
    assert_eq!(body["user"]["level"], 2);

    let response = app
        .oneshot(get("/api/notifications", "rep@example.com"))
        .await
        .unwrap();
    let notifications = json_body(response).await;
    assert_eq!(notifications.as_array().unwrap().len(), 1);
    assert_eq!(notifications[0]["type"], "level_up");
}

#[tokio::test]
async fn test_complete_without_body() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    seed_activity(&state, activity("intro", ActivityType::Roleplay, 40)).await;

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/activities/intro/complete")
                .header(
                    axum::http::header::AUTHORIZATION,
                    format!("Bearer {}", common::token_for("rep@example.com")),
                )
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["xp_earned"], 40);
    assert_eq!(body["leveled_up"], false);
}

#[tokio::test]
async fn test_unknown_activity_not_found() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/activities/missing/complete",
            "rep@example.com",
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_path_order_enforced() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;

    let mut first = activity("step-1", ActivityType::TrainingModule, 50);
    first.path_id = Some("onboarding".to_string());
    first.path_order = 1;
    let mut second = activity("step-2", ActivityType::Roleplay, 50);
    second.path_id = Some("onboarding".to_string());
    second.path_order = 2;
    seed_activity(&state, first).await;
    seed_activity(&state, second).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/activities/step-2/complete",
            "rep@example.com",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"], "activity_unavailable");

    let response = app
        .clone()
        .oneshot(get("/api/activities", "rep@example.com"))
        .await
        .unwrap();
    let views = json_body(response).await;
    let step_two = views
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["id"] == "step-2")
        .unwrap();
    assert_eq!(step_two["availability"]["state"], "locked");
    assert_eq!(step_two["availability"]["predecessor_id"], "step-1");
    assert_nothing_written(&state, "rep@example.com", 0).await;

    for id in ["step-1", "step-2"] {
        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                &format!("/api/activities/{id}/complete"),
                "rep@example.com",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "completing {id}");
    }
}

#[tokio::test]
async fn test_expired_activity_rejected() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    let mut old = activity("old", ActivityType::TrainingModule, 50);
    old.end_date = Some(Utc::now() - Duration::days(1));
    seed_activity(&state, old).await;

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/activities/old/complete",
            "rep@example.com",
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_nothing_written(&state, "rep@example.com", 0).await;
}

#[tokio::test]
async fn test_upcoming_activity_rejected() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 120).await;
    let mut launch = activity("launch", ActivityType::MicrolearningVideo, 30);
    launch.start_date = Some(Utc::now() + Duration::days(2));
    seed_activity(&state, launch).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/activities/launch/complete",
            "rep@example.com",
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert!(body["details"].as_str().unwrap().contains("not started"));
    assert_nothing_written(&state, "rep@example.com", 120).await;

    let response = app
        .oneshot(get("/api/activities", "rep@example.com"))
        .await
        .unwrap();
    let views = json_body(response).await;
    assert_eq!(views[0]["availability"]["state"], "upcoming");
}

#[tokio::test]
async fn test_scored_submission_clamps_score() {
    let (app, state) = create_test_app_with(Arc::new(FixedScore(150.0)));
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    seed_activity(&state, activity("agenda", ActivityType::CallAgendaUpload, 200)).await;

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/activities/agenda/submit",
            "rep@example.com",
            json!({"file_url": "https://files.example.com/agenda.pdf"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["xp_earned"], 200);
    assert_eq!(body["completion"]["score"], 100);
    assert!(body["feedback"].as_str().unwrap().contains("call to action"));
}

#[tokio::test]
async fn test_scored_submission_scales_xp() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    seed_activity(&state, activity("agenda", ActivityType::CallAgendaUpload, 200)).await;

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/activities/agenda/submit",
            "rep@example.com",
            json!({"file_url": "https://files.example.com/agenda.pdf", "notes": "first try"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["xp_earned"], 170);
    assert_eq!(body["completion"]["score"], 85);
    assert!(body["completion"]["notes"]
        .as_str()
        .unwrap()
        .ends_with("first try"));
}

#[tokio::test]
async fn test_scoring_outage_is_bad_gateway() {
    let (app, state) = create_test_app_with(Arc::new(FailingOracle));
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    seed_activity(&state, activity("agenda", ActivityType::CallAgendaUpload, 200)).await;

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/activities/agenda/submit",
            "rep@example.com",
            json!({"file_url": "https://files.example.com/agenda.pdf"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(state
        .store
        .list_completions_for_user("rep@example.com")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_submission_kind_must_match_activity() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    seed_activity(&state, activity("agenda", ActivityType::CallAgendaUpload, 200)).await;
    seed_activity(&state, activity("video", ActivityType::MicrolearningVideo, 20)).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/activities/agenda/complete",
            "rep@example.com",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/activities/video/submit",
            "rep@example.com",
            json!({"file_url": "https://files.example.com/a.pdf"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_badge_awarded_once() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    seed_activity(&state, activity("drill", ActivityType::Roleplay, 10)).await;
    seed_badge(&state, "first-steps", BadgeCriteria::ActivitiesCompleted, 1).await;

    let mut awarded = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                "/api/activities/drill/complete",
                "rep@example.com",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        awarded.push(body["badges_awarded"].as_array().unwrap().len());
    }
    assert_eq!(awarded, [1, 0]);

    let response = app
        .oneshot(get("/api/badges", "rep@example.com"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["earned"].as_array().unwrap().len(), 1);
    assert_eq!(body["earned"][0]["id"], "first-steps");
    assert_eq!(body["stats"]["completed_count"], 2);
}

#[tokio::test]
async fn test_concurrent_completions_keep_all_xp() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    seed_activity(&state, activity("drill", ActivityType::Roleplay, 10)).await;

    let requests = (0..10).map(|_| {
        app.clone().oneshot(send_json(
            "POST",
            "/api/activities/drill/complete",
            "rep@example.com",
            json!({}),
        ))
    });
    for response in futures_util::future::join_all(requests).await {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }

    let user = state.store.get_user("rep@example.com").await.unwrap().unwrap();
    assert_eq!(user.total_xp, 100);
}

#[tokio::test]
async fn test_leaderboard_ranks_by_xp() {
    let (app, state) = create_test_app();
    seed_user(&state, "a@example.com", Role::User, 300).await;
    seed_user(&state, "b@example.com", Role::User, 900).await;
    seed_user(&state, "c@example.com", Role::User, 0).await;

    let response = app
        .oneshot(get("/api/leaderboard", "a@example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["email"], "b@example.com");
    assert_eq!(body["my_rank"], 2);
    assert_eq!(body["period"], "all");
}

#[tokio::test]
async fn test_team_report_for_lead() {
    let (app, state) = create_test_app();
    state
        .store
        .upsert_department(&Department {
            id: "sales".to_string(),
            name: "Sales".to_string(),
            description: String::new(),
            head_email: None,
        })
        .await
        .unwrap();
    state
        .store
        .upsert_team(&Team {
            id: "west".to_string(),
            name: "West".to_string(),
            department_id: Some("sales".to_string()),
            lead_email: Some("lead@example.com".to_string()),
        })
        .await
        .unwrap();
    seed_user(&state, "lead@example.com", Role::TeamLead, 0).await;
    let mut member = seed_user(&state, "rep@example.com", Role::User, 250).await;
    member.team_id = Some("west".to_string());
    state.store.upsert_user(&member).await.unwrap();

    let response = app
        .oneshot(get("/api/team/report", "lead@example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["scope"]["kind"], "team");
    assert_eq!(body["scope"]["id"], "west");
    assert_eq!(body["members"][0]["email"], "rep@example.com");
}

#[tokio::test]
async fn test_notifications_read_flow() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    seed_user(&state, "other@example.com", Role::User, 0).await;
    seed_activity(&state, activity("big", ActivityType::TrainingModule, 1200)).await;
    seed_badge(&state, "xp", BadgeCriteria::TotalXp, 1000).await;

    app.clone()
        .oneshot(send_json(
            "POST",
            "/api/activities/big/complete",
            "rep@example.com",
            json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/notifications", "rep@example.com"))
        .await
        .unwrap();
    let notifications = json_body(response).await;
    assert_eq!(notifications.as_array().unwrap().len(), 2);
    let id = notifications[0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            &format!("/api/notifications/{id}/read"),
            "other@example.com",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            &format!("/api/notifications/{id}/read"),
            "rep@example.com",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["is_read"], true);

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/notifications/read-all",
            "rep@example.com",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["updated"], 1);
}

#[tokio::test]
async fn test_completions_paginate_newest_first() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 0).await;
    let base = Utc::now();
    for i in 0..3 {
        state
            .store
            .create_completion(&ActivityCompletion {
                id: format!("c{i}"),
                activity_id: "drill".to_string(),
                user_email: "rep@example.com".to_string(),
                status: CompletionStatus::Completed,
                score: None,
                xp_earned: 10,
                notes: None,
                file_url: None,
                completed_at: base - Duration::minutes(i),
            })
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(get("/api/completions?limit=2", "rep@example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    let ids: Vec<&str> = page["completions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["c0", "c1"]);
    let cursor = page["next_cursor"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get(
            &format!("/api/completions?limit=2&cursor={cursor}"),
            "rep@example.com",
        ))
        .await
        .unwrap();
    let page = json_body(response).await;
    assert_eq!(page["completions"][0]["id"], "c2");
    assert!(page["next_cursor"].is_null());
}

#[tokio::test]
async fn test_update_profile_cannot_touch_xp() {
    let (app, state) = create_test_app();
    seed_user(&state, "rep@example.com", Role::User, 120).await;

    let response = app
        .oneshot(send_json(
            "PATCH",
            "/api/me",
            "rep@example.com",
            json!({
                "full_name": "Rep One",
                "total_xp": 99999,
                "notification_preferences": {"inapp_milestones": false}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["full_name"], "Rep One");
    assert_eq!(body["total_xp"], 120);
    assert_eq!(body["notification_preferences"]["inapp_milestones"], false);
}
