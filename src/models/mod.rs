// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod badge;
pub mod completion;
pub mod notification;
pub mod organization;
pub mod user;

pub use activity::{Activity, ActivityPath, ActivityType};
pub use badge::{Badge, BadgeCriteria, UserBadge};
pub use completion::{ActivityCompletion, CompletionStatus};
pub use notification::{Notification, NotificationType, Priority};
pub use organization::{Department, InvitationStatus, PendingInvitation, Team};
pub use user::{NotificationPreferences, Role, User};
