// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (GitHub user snapshots, queried by ID and by star bucket)
//! - Last updates (scan cursors, one document per cursor name)
//! - Access tokens (API token per GitHub user)

use crate::db::{collections, CheckpointStore, TokenStore, UserStore};
use crate::error::AppError;
use crate::models::{Checkpoint, CursorName, RemoteUser, StarScanCursor, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::FirestoreQueryDirection;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Stored API token document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

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
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
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

    /// Store an API token for a user (used by provisioning and tests).
    pub async fn set_access_token(&self, user_id: u64, token: &str) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACCESS_TOKENS)
            .document_id(user_id.to_string())
            .object(&StoredToken {
                token: token.to_string(),
            })
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Query the first user under an ordering, optionally filtered below a star count.
    async fn first_user_by(
        &self,
        field: &'static str,
        below_stars: Option<u64>,
    ) -> Result<Option<UserRecord>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS);

        let query = match below_stars {
            Some(stars) => {
                query.filter(move |q| q.for_all([q.field("stargazers_count").less_than(stars)]))
            }
            None => query,
        };

        let users: Vec<UserRecord> = query
            .order_by([(field, FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    /// Write cursor documents in a single transaction.
    async fn write_cursors(&self, cursors: &[(CursorName, u64)]) -> Result<(), AppError> {
        let client = self.get_client()?;
        let now = Utc::now();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for (name, value) in cursors {
            client
                .fluent()
                .update()
                .in_col(collections::LAST_UPDATES)
                .document_id(name.as_str())
                .object(&Checkpoint {
                    cursor: *value,
                    updated_at: now,
                })
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add cursor {} to transaction: {}", name, e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Cursor commit failed: {}", e)))?;

        Ok(())
    }
}

// ─── Cursor Operations ───────────────────────────────────────────

#[async_trait]
impl CheckpointStore for FirestoreDb {
    async fn get_cursor(&self, name: CursorName) -> Result<u64, AppError> {
        let checkpoint: Option<Checkpoint> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LAST_UPDATES)
            .obj()
            .one(name.as_str())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(checkpoint.map(|c| c.cursor).unwrap_or(0))
    }

    async fn update_cursor(&self, name: CursorName, value: u64) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::LAST_UPDATES)
            .document_id(name.as_str())
            .object(&Checkpoint {
                cursor: value,
                updated_at: Utc::now(),
            })
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_star_scan_cursor(&self) -> Result<StarScanCursor, AppError> {
        Ok(StarScanCursor {
            stars: self.get_cursor(CursorName::StarScanStars).await?,
            user_id: self.get_cursor(CursorName::StarScanUser).await?,
        })
    }

    /// Both documents go in one transaction so a crash cannot leave the
    /// bucket and the in-bucket position out of step.
    async fn update_star_scan_cursor(&self, cursor: StarScanCursor) -> Result<(), AppError> {
        self.write_cursors(&[
            (CursorName::StarScanUser, cursor.user_id),
            (CursorName::StarScanStars, cursor.stars),
        ])
        .await
    }
}

// ─── User Operations ─────────────────────────────────────────────

#[async_trait]
impl UserStore for FirestoreDb {
    /// Reads which rows exist concurrently, then writes each chunk in one
    /// transaction. Known rows only get their remote fields written so a
    /// concurrent refresh of the same user keeps its stars and `updated_at`.
    async fn bulk_upsert(&self, users: &[RemoteUser]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in users.chunks(BATCH_SIZE) {
            let reader = self.clone();
            let known: HashSet<u64> = stream::iter(chunk.iter().map(|u| u.id).collect::<Vec<u64>>())
                .map(move |id| {
                    let reader = reader.clone();
                    async move { reader.get_user(id).await.map(|row| row.map(|_| id)) }
                })
                .buffer_unordered(MAX_CONCURRENT_DB_OPS)
                .collect::<Vec<Result<Option<u64>, AppError>>>()
                .await
                .into_iter()
                .collect::<Result<Vec<Option<u64>>, AppError>>()?
                .into_iter()
                .flatten()
                .collect();

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for user in chunk {
                let record = UserRecord::discovered(user);
                let update = client.fluent().update();
                let update = if known.contains(&user.id) {
                    update.fields(discovery_fields(user))
                } else {
                    update
                };

                update
                    .in_col(collections::USERS)
                    .document_id(user.id.to_string())
                    .object(&record)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add user to transaction: {}", e))
                    })?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Failed to commit user batch: {}", e)))?;
        }

        tracing::debug!(count = users.len(), "Bulk upserted users");
        Ok(())
    }

    async fn upsert_user(
        &self,
        user: &RemoteUser,
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let previous = self.get_user(user.id).await?;
        let record = UserRecord::refreshed(user, previous.as_ref(), refreshed_at);

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.id.to_string())
            .object(&record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_user(&self, id: u64) -> Result<Option<UserRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_updated_at(&self, id: u64) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(self.get_user(id).await?.map(|u| u.updated_at))
    }

    async fn users_after(&self, after_id: u64, limit: u32) -> Result<Vec<RemoteUser>, AppError> {
        let users: Vec<UserRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("id").greater_than(after_id)]))
            .order_by([("id", FirestoreQueryDirection::Ascending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.iter().map(RemoteUser::from).collect())
    }

    async fn users_with_stars(
        &self,
        stars: u64,
        after_id: u64,
        limit: u32,
    ) -> Result<Vec<RemoteUser>, AppError> {
        let users: Vec<UserRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| {
                q.for_all([
                    q.field("stargazers_count").eq(stars),
                    q.field("id").greater_than(after_id),
                ])
            })
            .order_by([("id", FirestoreQueryDirection::Ascending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.iter().map(RemoteUser::from).collect())
    }

    async fn max_star_count(&self) -> Result<u64, AppError> {
        Ok(self
            .first_user_by("stargazers_count", None)
            .await?
            .map(|u| u.stargazers_count)
            .unwrap_or(0))
    }

    async fn next_lower_star_count(&self, stars: u64) -> Result<u64, AppError> {
        if stars == 0 {
            return Ok(0);
        }
        Ok(self
            .first_user_by("stargazers_count", Some(stars))
            .await?
            .map(|u| u.stargazers_count)
            .unwrap_or(0))
    }

    async fn max_known_identifier(&self) -> Result<u64, AppError> {
        Ok(self
            .first_user_by("id", None)
            .await?
            .map(|u| u.id)
            .unwrap_or(0))
    }
}

// ─── Token Operations ────────────────────────────────────────────

#[async_trait]
impl TokenStore for FirestoreDb {
    async fn get_access_token(&self, user_id: u64) -> Result<Option<String>, AppError> {
        let stored: Option<StoredToken> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACCESS_TOKENS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(stored.map(|s| s.token))
    }
}

/// Fields a discovery page may overwrite on a known user.
fn discovery_fields(user: &RemoteUser) -> Vec<&'static str> {
    let mut fields = vec!["login", "user_type", "avatar_url"];
    if user.star_count.is_some() {
        fields.push("stargazers_count");
    }
    if user.updated_at.is_some() {
        fields.push("remote_updated_at");
    }
    fields
}
