// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Command of the Message tracker: progression and achievement backend.
//!
//! Employees complete training activities to earn XP, climb levels, unlock
//! sequenced learning paths and collect badges; leads and admins get
//! aggregate reports over the same records.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::EntityStore;
use services::{CompletionProcessor, ScoringOracle, UserLocks};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EntityStore>,
    pub completions: CompletionProcessor,
}

impl AppState {
    /// Wire the completion processor to `store` and `scoring`.
    pub fn new(
        config: Config,
        store: Arc<dyn EntityStore>,
        scoring: Arc<dyn ScoringOracle>,
    ) -> Self {
        let locks: UserLocks = Arc::new(dashmap::DashMap::new());
        let completions = CompletionProcessor::new(store.clone(), scoring, locks);
        Self {
            config,
            store,
            completions,
        }
    }
}
