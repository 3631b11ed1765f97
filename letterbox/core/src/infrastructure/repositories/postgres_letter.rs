// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Letter Repository
//!
//! `LetterRepository` backed by the `letters` and `letter_versions` tables.
//! A letter and its first version are written in one transaction so no
//! reader can observe a letter without content.

use std::collections::HashMap;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;
use tracing::debug;
use crate::domain::letter::{Letter, LetterHistory, LetterId, LetterVersion, VersionId};
use crate::domain::repository::{LetterRepository, RepositoryError};
use crate::domain::user::UserId;

pub struct PostgresLetterRepository {
    pool: PgPool,
}

impl PostgresLetterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach version histories to the given letter rows, preserving row order.
    async fn with_versions(&self, rows: Vec<PgRow>) -> Result<Vec<LetterHistory>, RepositoryError> {
        let letters = rows
            .iter()
            .map(letter_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if letters.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = letters.iter().map(|l| l.id.0).collect();
        let version_rows = sqlx::query(
            r#"
            SELECT id, letter_id, sequence, content, created_by, is_approved, created_at
            FROM letter_versions
            WHERE letter_id = ANY($1)
            ORDER BY letter_id, sequence ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<LetterId, Vec<LetterVersion>> = HashMap::new();
        for row in &version_rows {
            let version = version_from_row(row)?;
            grouped.entry(version.letter).or_default().push(version);
        }

        Ok(letters
            .into_iter()
            .map(|letter| {
                let versions = grouped.remove(&letter.id).unwrap_or_default();
                LetterHistory { letter, versions }
            })
            .collect())
    }
}

fn letter_from_row(row: &PgRow) -> Result<Letter, RepositoryError> {
    Ok(Letter {
        id: LetterId(row.try_get("id")?),
        sender: UserId(row.try_get("sender_id")?),
        receiver: UserId(row.try_get("receiver_id")?),
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn version_from_row(row: &PgRow) -> Result<LetterVersion, RepositoryError> {
    let sequence: i32 = row.try_get("sequence")?;
    let sequence = u32::try_from(sequence)
        .map_err(|_| RepositoryError::Serialization(format!("negative version sequence {}", sequence)))?;

    Ok(LetterVersion {
        id: VersionId(row.try_get("id")?),
        letter: LetterId(row.try_get("letter_id")?),
        sequence,
        content: row.try_get("content")?,
        created_by: UserId(row.try_get("created_by")?),
        is_approved: row.try_get("is_approved")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) async fn insert_version<'e, E>(executor: E, version: &LetterVersion) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO letter_versions (id, letter_id, sequence, content, created_by, is_approved, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(version.id.0)
    .bind(version.letter.0)
    .bind(version.sequence as i32)
    .bind(&version.content)
    .bind(version.created_by.0)
    .bind(version.is_approved)
    .bind(version.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl LetterRepository for PostgresLetterRepository {
    async fn create(&self, history: &LetterHistory) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO letters (id, sender_id, receiver_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(history.letter.id.0)
        .bind(history.letter.sender.0)
        .bind(history.letter.receiver.0)
        .bind(history.letter.created_at)
        .execute(&mut *tx)
        .await?;

        for version in &history.versions {
            insert_version(&mut *tx, version).await?;
        }

        tx.commit().await?;
        debug!(letter_id = %history.letter.id, versions = history.versions.len(), "Stored letter");
        Ok(())
    }

    async fn find_by_id(&self, id: LetterId) -> Result<Option<LetterHistory>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, created_at FROM letters WHERE id = $1",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(self.with_versions(rows).await?.into_iter().next())
    }

    async fn find_between(&self, a: UserId, b: UserId) -> Result<Vec<LetterHistory>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender_id, receiver_id, created_at
            FROM letters
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(a.0)
        .bind(b.0)
        .fetch_all(&self.pool)
        .await?;
        self.with_versions(rows).await
    }

    async fn find_for_user(&self, user: UserId) -> Result<Vec<LetterHistory>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender_id, receiver_id, created_at
            FROM letters
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?;
        self.with_versions(rows).await
    }
}
