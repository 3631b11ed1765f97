// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Modification Repository
//!
//! `ModificationRepository` backed by the `modification_requests` table.
//!
//! Approval runs in one transaction:
//!
//! 1. `SELECT ... FOR UPDATE` on the parent letter row, which serializes
//!    every version append for that letter
//! 2. `UPDATE ... WHERE status = 'PENDING'`; zero affected rows means a
//!    concurrent call already resolved the request and the transaction is
//!    rolled back
//! 3. Insert the new version with the next per-letter sequence
//!
//! A reader therefore never sees APPROVED without its version or the
//! reverse.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::debug;
use crate::domain::letter::{LetterId, LetterVersion};
use crate::domain::modification::{ModificationId, ModificationRequest, ModificationStatus};
use crate::domain::repository::{ModificationRepository, RepositoryError};
use crate::domain::user::UserId;
use super::postgres_letter::insert_version;

const SELECT_COLUMNS: &str = "m.id, m.letter_id, m.requested_by, m.proposed_content, m.status, m.requested_at, m.approved_at";

pub struct PostgresModificationRepository {
    pool: PgPool,
}

impl PostgresModificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a guarded UPDATE matched no row.
    async fn not_pending(&self, id: ModificationId) -> RepositoryError {
        match self.find_by_id(id).await {
            Ok(Some(current)) => RepositoryError::Stale(format!(
                "modification {} is already {}",
                id, current.status
            )),
            Ok(None) => RepositoryError::NotFound(format!("modification {}", id)),
            Err(e) => e,
        }
    }
}

fn modification_from_row(row: &PgRow) -> Result<ModificationRequest, RepositoryError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<ModificationStatus>()
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    Ok(ModificationRequest {
        id: ModificationId(row.try_get("id")?),
        letter: LetterId(row.try_get("letter_id")?),
        requested_by: UserId(row.try_get("requested_by")?),
        proposed_content: row.try_get("proposed_content")?,
        status,
        requested_at: row.try_get("requested_at")?,
        approved_at: row.try_get("approved_at")?,
    })
}

#[async_trait]
impl ModificationRepository for PostgresModificationRepository {
    async fn insert(&self, request: &ModificationRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO modification_requests
                (id, letter_id, requested_by, proposed_content, status, requested_at, approved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(request.id.0)
        .bind(request.letter.0)
        .bind(request.requested_by.0)
        .bind(&request.proposed_content)
        .bind(request.status.as_str())
        .bind(request.requested_at)
        .bind(request.approved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: ModificationId) -> Result<Option<ModificationRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM modification_requests m WHERE m.id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(modification_from_row).transpose()
    }

    async fn has_pending(&self, letter: LetterId) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM modification_requests WHERE letter_id = $1 AND status = 'PENDING')",
        )
        .bind(letter.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_pending_for_sender(&self, sender: UserId) -> Result<Vec<ModificationRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM modification_requests m
            JOIN letters l ON l.id = m.letter_id
            WHERE l.sender_id = $1 AND m.status = 'PENDING'
            ORDER BY m.requested_at ASC, m.id ASC
            "#,
            SELECT_COLUMNS
        ))
        .bind(sender.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(modification_from_row).collect()
    }

    async fn find_visible_to(&self, user: UserId) -> Result<Vec<ModificationRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM modification_requests m
            JOIN letters l ON l.id = m.letter_id
            WHERE l.sender_id = $1 OR l.receiver_id = $1
            ORDER BY m.requested_at ASC, m.id ASC
            "#,
            SELECT_COLUMNS
        ))
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(modification_from_row).collect()
    }

    async fn commit_approval(&self, request: &ModificationRequest) -> Result<LetterVersion, RepositoryError> {
        if request.status != ModificationStatus::Approved {
            return Err(RepositoryError::Unknown(format!(
                "commit_approval called with {} modification",
                request.status
            )));
        }
        let approved_at = request.approved_at.unwrap_or_else(Utc::now);

        let mut tx = self.pool.begin().await?;

        let letter = sqlx::query("SELECT id FROM letters WHERE id = $1 FOR UPDATE")
            .bind(request.letter.0)
            .fetch_optional(&mut *tx)
            .await?;
        if letter.is_none() {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!("letter {}", request.letter)));
        }

        let updated = sqlx::query(
            r#"
            UPDATE modification_requests
            SET status = 'APPROVED', approved_at = $2
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(request.id.0)
        .bind(approved_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.not_pending(request.id).await);
        }

        let next_sequence: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM letter_versions WHERE letter_id = $1",
        )
        .bind(request.letter.0)
        .fetch_one(&mut *tx)
        .await?;
        let next_sequence = u32::try_from(next_sequence)
            .map_err(|_| RepositoryError::Serialization(format!("invalid next sequence {}", next_sequence)))?;

        let version = LetterVersion::from_approved_modification(request, next_sequence);
        insert_version(&mut *tx, &version).await?;

        tx.commit().await?;
        debug!(modification_id = %request.id, sequence = version.sequence, "Committed approval");
        Ok(version)
    }

    async fn commit_rejection(&self, request: &ModificationRequest) -> Result<(), RepositoryError> {
        if request.status != ModificationStatus::Rejected {
            return Err(RepositoryError::Unknown(format!(
                "commit_rejection called with {} modification",
                request.status
            )));
        }

        let updated = sqlx::query(
            "UPDATE modification_requests SET status = 'REJECTED' WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(request.id.0)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(self.not_pending(request.id).await);
        }
        Ok(())
    }
}
