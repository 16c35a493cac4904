// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use cotm_tracker::config::Config;
use cotm_tracker::db::{EntityStore, FirestoreDb, MemoryStore};
use cotm_tracker::middleware::auth::create_jwt;
use cotm_tracker::models::{Activity, ActivityType, Badge, BadgeCriteria, Role, User};
use cotm_tracker::routes::create_router;
use cotm_tracker::services::scoring::{ScoringError, ScoringOracle, ScoringVerdict};
use cotm_tracker::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Oracle that answers every submission with the same verdict.
pub struct FixedScore(pub f64);

#[async_trait]
impl ScoringOracle for FixedScore {
    async fn score(&self, _rubric: &str, _file_url: &str) -> Result<ScoringVerdict, ScoringError> {
        Ok(ScoringVerdict {
            score: self.0,
            feedback: "Clear objective; tighten the call to action.".to_string(),
        })
    }
}

/// Oracle that takes `delay` before scoring every upload 100.
#[allow(dead_code)]
pub struct SlowOracle(pub std::time::Duration);

#[async_trait]
impl ScoringOracle for SlowOracle {
    async fn score(&self, _rubric: &str, _file_url: &str) -> Result<ScoringVerdict, ScoringError> {
        tokio::time::sleep(self.0).await;
        Ok(ScoringVerdict {
            score: 100.0,
            feedback: "Strong agenda.".to_string(),
        })
    }
}

/// Oracle that is always down.
#[allow(dead_code)]
pub struct FailingOracle;

#[async_trait]
impl ScoringOracle for FailingOracle {
    async fn score(&self, _rubric: &str, _file_url: &str) -> Result<ScoringVerdict, ScoringError> {
        Err(ScoringError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

/// Test app over an in-memory store with the given scoring oracle.
#[allow(dead_code)]
pub fn create_test_app_with(scoring: Arc<dyn ScoringOracle>) -> (axum::Router, Arc<AppState>) {
    let store: Arc<dyn EntityStore> = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(Config::test_default(), store, scoring));
    (create_router(state.clone()), state)
}

/// Test app whose oracle scores every upload 85.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Arc::new(FixedScore(85.0)))
}

/// Bearer token for `email`, signed with the test key.
#[allow(dead_code)]
pub fn token_for(email: &str) -> String {
    create_jwt(email, &Config::test_default().jwt_signing_key).unwrap()
}

#[allow(dead_code)]
pub fn get(uri: &str, email: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(email)))
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub fn send_json(method: &str, uri: &str, email: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(email)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[allow(dead_code)]
pub async fn seed_user(state: &AppState, email: &str, role: Role, total_xp: u64) -> User {
    let mut user = User::new(email, email.split('@').next().unwrap());
    user.role = role;
    user.total_xp = total_xp;
    user.level = cotm_tracker::services::progression::level_for_xp(total_xp);
    state.store.upsert_user(&user).await.unwrap();
    user
}

#[allow(dead_code)]
pub fn activity(id: &str, activity_type: ActivityType, xp_value: u32) -> Activity {
    Activity {
        id: id.to_string(),
        title: format!("Activity {id}"),
        description: String::new(),
        activity_type,
        xp_value,
        scoring_criteria: None,
        video_url: None,
        order: 0,
        is_active: true,
        start_date: None,
        end_date: None,
        path_id: None,
        path_order: 0,
    }
}

#[allow(dead_code)]
pub async fn seed_activity(state: &AppState, activity: Activity) -> Activity {
    state.store.upsert_activity(&activity).await.unwrap();
    activity
}

#[allow(dead_code)]
pub async fn seed_badge(state: &AppState, id: &str, criteria: BadgeCriteria, value: u64) -> Badge {
    let badge = Badge {
        id: id.to_string(),
        name: format!("Badge {id}"),
        description: String::new(),
        icon: None,
        color: None,
        criteria_type: criteria,
        criteria_value: value,
        is_active: true,
    };
    state.store.upsert_badge(&badge).await.unwrap();
    badge
}
