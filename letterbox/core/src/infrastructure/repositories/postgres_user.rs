// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL User Repository
//!
//! `UserRepository` backed by the `users` table. Username uniqueness is
//! enforced by the table's UNIQUE constraint and surfaces as
//! `RepositoryError::Conflict`.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use crate::domain::repository::{RepositoryError, UserRepository};
use crate::domain::user::{User, UserId};

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        joined_at: row.try_get("joined_at")?,
    })
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO users (id, username, joined_at) VALUES ($1, $2, $3)")
            .bind(user.id.0)
            .bind(&user.username)
            .bind(user.joined_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, username, joined_at FROM users WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, username, joined_at FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn search(&self, fragment: &str, excluding: Option<UserId>) -> Result<Vec<User>, RepositoryError> {
        // LIKE metacharacters in the fragment are matched literally
        let escaped = fragment
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let rows = sqlx::query(
            r#"
            SELECT id, username, joined_at
            FROM users
            WHERE username ILIKE '%' || $1 || '%'
              AND ($2::uuid IS NULL OR id <> $2)
            ORDER BY username ASC
            "#,
        )
        .bind(escaped)
        .bind(excluding.map(|u| u.0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }
}
