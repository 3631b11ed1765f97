// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Repository
//!
//! `ConnectionRepository` backed by the `connections` table. The
//! `connections_unordered_pair` unique index rejects a second connection
//! between the same two users in either direction.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::debug;
use crate::domain::connection::{Connection, ConnectionId, ConnectionStatus};
use crate::domain::repository::{ConnectionRepository, RepositoryError};
use crate::domain::user::UserId;

pub struct PostgresConnectionRepository {
    pool: PgPool,
}

impl PostgresConnectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn connection_from_row(row: &PgRow) -> Result<Connection, RepositoryError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<ConnectionStatus>()
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    Ok(Connection {
        id: ConnectionId(row.try_get("id")?),
        requester: UserId(row.try_get("requester_id")?),
        receiver: UserId(row.try_get("receiver_id")?),
        status,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ConnectionRepository for PostgresConnectionRepository {
    async fn insert(&self, connection: &Connection) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO connections (id, requester_id, receiver_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(connection.id.0)
        .bind(connection.requester.0)
        .bind(connection.receiver.0)
        .bind(connection.status.as_str())
        .bind(connection.created_at)
        .execute(&self.pool)
        .await?;

        debug!(connection_id = %connection.id, "Stored connection");
        Ok(())
    }

    async fn find_by_id(&self, id: ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, requester_id, receiver_id, status, created_at FROM connections WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(connection_from_row).transpose()
    }

    async fn find_between(&self, a: UserId, b: UserId) -> Result<Option<Connection>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, requester_id, receiver_id, status, created_at
            FROM connections
            WHERE (requester_id = $1 AND receiver_id = $2)
               OR (requester_id = $2 AND receiver_id = $1)
            "#,
        )
        .bind(a.0)
        .bind(b.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(connection_from_row).transpose()
    }

    async fn find_for_user(&self, user: UserId) -> Result<Vec<Connection>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, requester_id, receiver_id, status, created_at
            FROM connections
            WHERE requester_id = $1 OR receiver_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(connection_from_row).collect()
    }

    async fn mark_accepted(&self, id: ConnectionId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE connections SET status = 'ACCEPTED' WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.find_by_id(id).await? {
            Some(current) => Err(RepositoryError::Stale(format!(
                "connection {} is already {}",
                id, current.status
            ))),
            None => Err(RepositoryError::NotFound(format!("connection {}", id))),
        }
    }
}
