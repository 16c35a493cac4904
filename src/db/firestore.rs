// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Every collection is a flat set of documents keyed by the record's id
//! (users by email, awarded badges by `user_badge_id`).

use crate::db::{collections, EntityStore};
use crate::error::AppError;
use crate::models::badge::user_badge_id;
use crate::models::{
    Activity, ActivityCompletion, ActivityPath, Badge, Department, Notification,
    PendingInvitation, Team, User, UserBadge,
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Document Operations ─────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_docs<T>(&self, collection: &str) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Documents whose `field` equals `value`.
    async fn list_docs_where<T>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| q.for_all([q.field(field).eq(value)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_doc<T>(&self, collection: &str, id: &str, object: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, email: &str) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, email).await
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.list_docs(collections::USERS).await
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.set_doc(collections::USERS, &user.email, user).await
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity(&self, id: &str) -> Result<Option<Activity>, AppError> {
        self.get_doc(collections::ACTIVITIES, id).await
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
        self.list_docs(collections::ACTIVITIES).await
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.set_doc(collections::ACTIVITIES, &activity.id, activity)
            .await
    }

    async fn delete_activity(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::ACTIVITIES, id).await
    }

    // ─── Path Operations ─────────────────────────────────────────

    async fn get_path(&self, id: &str) -> Result<Option<ActivityPath>, AppError> {
        self.get_doc(collections::ACTIVITY_PATHS, id).await
    }

    async fn list_paths(&self) -> Result<Vec<ActivityPath>, AppError> {
        self.list_docs(collections::ACTIVITY_PATHS).await
    }

    async fn upsert_path(&self, path: &ActivityPath) -> Result<(), AppError> {
        self.set_doc(collections::ACTIVITY_PATHS, &path.id, path)
            .await
    }

    async fn delete_path(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::ACTIVITY_PATHS, id).await
    }

    // ─── Completion Operations ───────────────────────────────────

    async fn get_completion(&self, id: &str) -> Result<Option<ActivityCompletion>, AppError> {
        self.get_doc(collections::COMPLETIONS, id).await
    }

    async fn list_completions(&self) -> Result<Vec<ActivityCompletion>, AppError> {
        self.list_docs(collections::COMPLETIONS).await
    }

    async fn list_completions_for_user(
        &self,
        email: &str,
    ) -> Result<Vec<ActivityCompletion>, AppError> {
        self.list_docs_where(collections::COMPLETIONS, "user_email", email)
            .await
    }

    async fn create_completion(&self, completion: &ActivityCompletion) -> Result<(), AppError> {
        self.set_doc(collections::COMPLETIONS, &completion.id, completion)
            .await
    }

    async fn delete_completion(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::COMPLETIONS, id).await
    }

    // ─── Badge Operations ────────────────────────────────────────

    async fn get_badge(&self, id: &str) -> Result<Option<Badge>, AppError> {
        self.get_doc(collections::BADGES, id).await
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, AppError> {
        self.list_docs(collections::BADGES).await
    }

    async fn upsert_badge(&self, badge: &Badge) -> Result<(), AppError> {
        self.set_doc(collections::BADGES, &badge.id, badge).await
    }

    async fn delete_badge(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::BADGES, id).await
    }

    async fn list_user_badges(&self, email: &str) -> Result<Vec<UserBadge>, AppError> {
        self.list_docs_where(collections::USER_BADGES, "user_email", email)
            .await
    }

    /// Insert with create semantics: Firestore rejects the write if the
    /// document already exists, which makes concurrent awards safe.
    async fn insert_user_badge(&self, user_badge: &UserBadge) -> Result<bool, AppError> {
        let doc_id = user_badge_id(&user_badge.user_email, &user_badge.badge_id);

        let result: Result<UserBadge, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USER_BADGES)
            .document_id(&doc_id)
            .object(user_badge)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => {
                tracing::debug!(
                    user = %user_badge.user_email,
                    badge_id = %user_badge.badge_id,
                    "Badge already awarded (conflict on create)"
                );
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    // ─── Organisation Operations ─────────────────────────────────

    async fn get_department(&self, id: &str) -> Result<Option<Department>, AppError> {
        self.get_doc(collections::DEPARTMENTS, id).await
    }

    async fn list_departments(&self) -> Result<Vec<Department>, AppError> {
        self.list_docs(collections::DEPARTMENTS).await
    }

    async fn upsert_department(&self, department: &Department) -> Result<(), AppError> {
        self.set_doc(collections::DEPARTMENTS, &department.id, department)
            .await
    }

    async fn delete_department(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::DEPARTMENTS, id).await
    }

    async fn get_team(&self, id: &str) -> Result<Option<Team>, AppError> {
        self.get_doc(collections::TEAMS, id).await
    }

    async fn list_teams(&self) -> Result<Vec<Team>, AppError> {
        self.list_docs(collections::TEAMS).await
    }

    async fn upsert_team(&self, team: &Team) -> Result<(), AppError> {
        self.set_doc(collections::TEAMS, &team.id, team).await
    }

    async fn delete_team(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::TEAMS, id).await
    }

    // ─── Notification Operations ─────────────────────────────────

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, AppError> {
        self.get_doc(collections::NOTIFICATIONS, id).await
    }

    async fn list_notifications_for_user(
        &self,
        email: &str,
    ) -> Result<Vec<Notification>, AppError> {
        self.list_docs_where(collections::NOTIFICATIONS, "user_email", email)
            .await
    }

    async fn upsert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.set_doc(collections::NOTIFICATIONS, &notification.id, notification)
            .await
    }

    /// Upsert notifications in chunked transactions.
    async fn save_notifications(&self, notifications: &[Notification]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in notifications.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for notification in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::NOTIFICATIONS)
                    .document_id(&notification.id)
                    .object(notification)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add notification to transaction: {}",
                            e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit notification batch: {}", e))
            })?;
        }

        tracing::debug!(count = notifications.len(), "Notifications written");
        Ok(())
    }

    // ─── Invitation Operations ───────────────────────────────────

    async fn get_invitation(&self, id: &str) -> Result<Option<PendingInvitation>, AppError> {
        self.get_doc(collections::INVITATIONS, id).await
    }

    async fn list_invitations(&self) -> Result<Vec<PendingInvitation>, AppError> {
        self.list_docs(collections::INVITATIONS).await
    }

    async fn upsert_invitation(&self, invitation: &PendingInvitation) -> Result<(), AppError> {
        self.set_doc(collections::INVITATIONS, &invitation.id, invitation)
            .await
    }
}
