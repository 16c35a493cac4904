// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.
//!
//! `progression`, `unlock`, `badges` and `reporting` are pure evaluators
//! over already-loaded records; `completion` and `identity` apply their
//! results through the entity store.

pub mod badges;
pub mod completion;
pub mod identity;
pub mod progression;
pub mod reporting;
pub mod scoring;
pub mod unlock;

pub use completion::{CompletionOutcome, CompletionProcessor, Submission, UserLocks};
pub use scoring::{LlmScoringClient, ScoringOracle};
