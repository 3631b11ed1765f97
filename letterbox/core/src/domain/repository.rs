// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate, following the DDD Repository
//! pattern: interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `UserRepository` | `User` | `InMemoryUserRepository`, `PostgresUserRepository` |
//! | `ConnectionRepository` | `Connection` | `InMemoryConnectionRepository`, `PostgresConnectionRepository` |
//! | `LetterRepository` | `LetterHistory` | `InMemoryLetterRepository`, `PostgresLetterRepository` |
//! | `ModificationRepository` | `ModificationRequest` | `InMemoryModificationRepository`, `PostgresModificationRepository` |
//!
//! ## Atomic units
//!
//! Three writes span more than one row and must be all-or-nothing:
//! `LetterRepository::create` (letter + first version),
//! `ModificationRepository::commit_approval` (status + new version) and
//! `ModificationRepository::commit_rejection`. Status transitions are
//! compare-and-set: when the stored row is no longer PENDING the call fails
//! with [`RepositoryError::Stale`] and writes nothing.

use async_trait::async_trait;
use crate::domain::connection::{Connection, ConnectionId};
use crate::domain::letter::{LetterHistory, LetterId, LetterVersion};
use crate::domain::modification::{ModificationId, ModificationRequest};
use crate::domain::user::{User, UserId};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Fails with `Conflict` when the username is taken.
    async fn save(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Case-insensitive substring search ordered by username.
    async fn search(&self, fragment: &str, excluding: Option<UserId>) -> Result<Vec<User>, RepositoryError>;
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Insert a pending connection. Fails with `Conflict` if any connection
    /// already links the two users, in either direction.
    async fn insert(&self, connection: &Connection) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: ConnectionId) -> Result<Option<Connection>, RepositoryError>;

    /// Connection between the two users regardless of request direction
    async fn find_between(&self, a: UserId, b: UserId) -> Result<Option<Connection>, RepositoryError>;

    /// Connections where the user is either party, oldest first
    async fn find_for_user(&self, user: UserId) -> Result<Vec<Connection>, RepositoryError>;

    /// PENDING -> ACCEPTED, compare-and-set.
    async fn mark_accepted(&self, id: ConnectionId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait LetterRepository: Send + Sync {
    /// Persist a new letter together with its versions in one unit.
    async fn create(&self, history: &LetterHistory) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: LetterId) -> Result<Option<LetterHistory>, RepositoryError>;

    /// Letters exchanged between the two users, oldest first
    async fn find_between(&self, a: UserId, b: UserId) -> Result<Vec<LetterHistory>, RepositoryError>;

    /// Letters where the user is sender or receiver, oldest first
    async fn find_for_user(&self, user: UserId) -> Result<Vec<LetterHistory>, RepositoryError>;
}

#[async_trait]
pub trait ModificationRepository: Send + Sync {
    async fn insert(&self, request: &ModificationRequest) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: ModificationId) -> Result<Option<ModificationRequest>, RepositoryError>;

    async fn has_pending(&self, letter: LetterId) -> Result<bool, RepositoryError>;

    /// PENDING requests on letters sent by `sender`
    async fn find_pending_for_sender(&self, sender: UserId) -> Result<Vec<ModificationRequest>, RepositoryError>;

    /// Requests of any status on letters where the user participates
    async fn find_visible_to(&self, user: UserId) -> Result<Vec<ModificationRequest>, RepositoryError>;

    /// Store `request` (already transitioned to APPROVED) and append the
    /// resulting version to its letter. Returns the appended version.
    async fn commit_approval(&self, request: &ModificationRequest) -> Result<LetterVersion, RepositoryError>;

    /// Store `request` (already transitioned to REJECTED).
    async fn commit_rejection(&self, request: &ModificationRequest) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Uniqueness violated: {0}")]
    Conflict(String),

    #[error("Stale write rejected: {0}")]
    Stale(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RepositoryError::Conflict(db_err.message().to_string());
            }
        }
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}
