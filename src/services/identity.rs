// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User resolution and invitations.
//!
//! The identity provider owns authentication; this service owns the user
//! row. A user signing in for the first time is provisioned from their
//! pending invitation (role and team), or as a plain user without one.

use chrono::{DateTime, Utc};

use crate::db::EntityStore;
use crate::error::{AppError, Result};
use crate::models::{InvitationStatus, PendingInvitation, Role, User};

/// Canonical form of an email used as a document id.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Load the user for `email`, provisioning the row on first sight.
pub async fn resolve_user(
    store: &dyn EntityStore,
    email: &str,
    display_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<User> {
    let email = normalize_email(email);
    if let Some(user) = store.get_user(&email).await? {
        return Ok(user);
    }

    let invitation = store
        .list_invitations()
        .await?
        .into_iter()
        .filter(|inv| inv.status == InvitationStatus::Pending && normalize_email(&inv.email) == email)
        .max_by_key(|inv| inv.created_at);

    let full_name = display_name
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    let mut user = User::new(&email, full_name);
    user.created_at = Some(now);

    if let Some(mut invitation) = invitation {
        user.role = invitation.role;
        user.team_id = invitation.team_id.clone();
        if let Some(team_id) = &invitation.team_id {
            user.department_id = store.get_team(team_id).await?.and_then(|t| t.department_id);
        }

        store.upsert_user(&user).await?;
        invitation.status = InvitationStatus::Accepted;
        store.upsert_invitation(&invitation).await?;

        tracing::info!(
            user = %email,
            role = ?user.role,
            invitation_id = %invitation.id,
            "Provisioned user from invitation"
        );
    } else {
        store.upsert_user(&user).await?;
        tracing::info!(user = %email, "Provisioned new user");
    }

    Ok(user)
}

/// Record a pending invitation for someone who has not signed in yet.
pub async fn invite_user(
    store: &dyn EntityStore,
    email: &str,
    role: Role,
    team_id: Option<String>,
    invited_by: &str,
    now: DateTime<Utc>,
) -> Result<PendingInvitation> {
    let email = normalize_email(email);

    if store.get_user(&email).await?.is_some() {
        return Err(AppError::BadRequest(format!("{} is already registered", email)));
    }

    if let Some(team_id) = &team_id {
        if store.get_team(team_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        }
    }

    let already_pending = store
        .list_invitations()
        .await?
        .iter()
        .any(|inv| inv.status == InvitationStatus::Pending && normalize_email(&inv.email) == email);
    if already_pending {
        return Err(AppError::BadRequest(format!(
            "{} already has a pending invitation",
            email
        )));
    }

    let invitation = PendingInvitation {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        role,
        team_id,
        invited_by: invited_by.to_string(),
        status: InvitationStatus::Pending,
        created_at: now,
    };
    store.upsert_invitation(&invitation).await?;

    tracing::info!(
        email = %invitation.email,
        invited_by,
        "Invitation recorded"
    );
    Ok(invitation)
}

/// Mark a pending invitation cancelled.
pub async fn cancel_invitation(store: &dyn EntityStore, id: &str) -> Result<PendingInvitation> {
    let mut invitation = store
        .get_invitation(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invitation {}", id)))?;

    if invitation.status != InvitationStatus::Pending {
        return Err(AppError::BadRequest("Invitation is no longer pending".to_string()));
    }

    invitation.status = InvitationStatus::Cancelled;
    store.upsert_invitation(&invitation).await?;
    Ok(invitation)
}
