// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository abstractions defined in
//! the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresUserRepository** - user directory
//! - **PostgresConnectionRepository** - connection requests and acceptance
//! - **PostgresLetterRepository** - letters and their version history
//! - **PostgresModificationRepository** - proposed edits and their resolution
//!
//! ## In-Memory Repositories
//!
//! Insertion-ordered, lock-guarded storage for development and tests. The
//! modification repository shares the letter store so that approval can
//! append a version and flip the request status under the same locks.
//!
//! # Usage
//!
//! ```ignore
//! use sqlx::PgPool;
//! use repositories::postgres_letter::PostgresLetterRepository;
//!
//! let pool = PgPool::connect(&database_url).await?;
//! let repo = PostgresLetterRepository::new(pool);
//! let thread = repo.find_between(alice, bob).await?;
//! ```

pub mod postgres_connection;
pub mod postgres_letter;
pub mod postgres_modification;
pub mod postgres_user;

use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use crate::domain::connection::{Connection, ConnectionId, ConnectionStatus};
use crate::domain::letter::{LetterHistory, LetterId, LetterVersion};
use crate::domain::modification::{ModificationId, ModificationRequest, ModificationStatus};
use crate::domain::repository::{
    ConnectionRepository, LetterRepository, ModificationRepository, RepositoryError, UserRepository,
};
use crate::domain::user::{User, UserId};

#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<Vec<User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict(format!(
                "username '{}' is taken",
                user.username
            )));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn search(&self, fragment: &str, excluding: Option<UserId>) -> Result<Vec<User>, RepositoryError> {
        let mut matches: Vec<User> = self
            .users
            .read()
            .iter()
            .filter(|u| Some(u.id) != excluding && u.username_contains(fragment))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(matches)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryConnectionRepository {
    connections: Arc<RwLock<Vec<Connection>>>,
}

impl InMemoryConnectionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryConnectionRepository {
    async fn insert(&self, connection: &Connection) -> Result<(), RepositoryError> {
        // Check and insert under one write lock so racing requests cannot both land
        let mut connections = self.connections.write();
        if connections
            .iter()
            .any(|c| c.links(connection.requester, connection.receiver))
        {
            return Err(RepositoryError::Conflict(format!(
                "connection between {} and {} already exists",
                connection.requester, connection.receiver
            )));
        }
        connections.push(connection.clone());
        debug!(connection_id = %connection.id, "Stored connection");
        Ok(())
    }

    async fn find_by_id(&self, id: ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        Ok(self.connections.read().iter().find(|c| c.id == id).cloned())
    }

    async fn find_between(&self, a: UserId, b: UserId) -> Result<Option<Connection>, RepositoryError> {
        Ok(self.connections.read().iter().find(|c| c.links(a, b)).cloned())
    }

    async fn find_for_user(&self, user: UserId) -> Result<Vec<Connection>, RepositoryError> {
        Ok(self
            .connections
            .read()
            .iter()
            .filter(|c| c.counterpart(user).is_some())
            .cloned()
            .collect())
    }

    async fn mark_accepted(&self, id: ConnectionId) -> Result<(), RepositoryError> {
        let mut connections = self.connections.write();
        let connection = connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("connection {}", id)))?;
        if connection.status != ConnectionStatus::Pending {
            return Err(RepositoryError::Stale(format!(
                "connection {} is already {}",
                id, connection.status
            )));
        }
        connection.status = ConnectionStatus::Accepted;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryLetterRepository {
    letters: Arc<RwLock<Vec<LetterHistory>>>,
}

impl InMemoryLetterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LetterRepository for InMemoryLetterRepository {
    async fn create(&self, history: &LetterHistory) -> Result<(), RepositoryError> {
        let mut letters = self.letters.write();
        if letters.iter().any(|h| h.letter.id == history.letter.id) {
            return Err(RepositoryError::Conflict(format!(
                "letter {} already exists",
                history.letter.id
            )));
        }
        letters.push(history.clone());
        debug!(letter_id = %history.letter.id, versions = history.versions.len(), "Stored letter");
        Ok(())
    }

    async fn find_by_id(&self, id: LetterId) -> Result<Option<LetterHistory>, RepositoryError> {
        Ok(self.letters.read().iter().find(|h| h.letter.id == id).cloned())
    }

    async fn find_between(&self, a: UserId, b: UserId) -> Result<Vec<LetterHistory>, RepositoryError> {
        let mut found: Vec<_> = self
            .letters
            .read()
            .iter()
            .filter(|h| {
                (h.letter.sender == a && h.letter.receiver == b)
                    || (h.letter.sender == b && h.letter.receiver == a)
            })
            .cloned()
            .collect();
        found.sort_by_key(|h| h.letter.listing_key());
        Ok(found)
    }

    async fn find_for_user(&self, user: UserId) -> Result<Vec<LetterHistory>, RepositoryError> {
        let mut found: Vec<_> = self
            .letters
            .read()
            .iter()
            .filter(|h| h.letter.sender == user || h.letter.receiver == user)
            .cloned()
            .collect();
        found.sort_by_key(|h| h.letter.listing_key());
        Ok(found)
    }
}

/// Lock order: modifications, then letters.
#[derive(Clone)]
pub struct InMemoryModificationRepository {
    modifications: Arc<RwLock<Vec<ModificationRequest>>>,
    letters: InMemoryLetterRepository,
}

impl InMemoryModificationRepository {
    pub fn new(letters: InMemoryLetterRepository) -> Self {
        Self {
            modifications: Arc::new(RwLock::new(Vec::new())),
            letters,
        }
    }

    fn stale(stored: &ModificationRequest) -> RepositoryError {
        RepositoryError::Stale(format!(
            "modification {} is already {}",
            stored.id, stored.status
        ))
    }
}

#[async_trait]
impl ModificationRepository for InMemoryModificationRepository {
    async fn insert(&self, request: &ModificationRequest) -> Result<(), RepositoryError> {
        self.modifications.write().push(request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ModificationId) -> Result<Option<ModificationRequest>, RepositoryError> {
        Ok(self.modifications.read().iter().find(|m| m.id == id).cloned())
    }

    async fn has_pending(&self, letter: LetterId) -> Result<bool, RepositoryError> {
        Ok(self
            .modifications
            .read()
            .iter()
            .any(|m| m.letter == letter && m.is_pending()))
    }

    async fn find_pending_for_sender(&self, sender: UserId) -> Result<Vec<ModificationRequest>, RepositoryError> {
        let modifications = self.modifications.read();
        let letters = self.letters.letters.read();
        Ok(modifications
            .iter()
            .filter(|m| m.is_pending())
            .filter(|m| {
                letters
                    .iter()
                    .any(|h| h.letter.id == m.letter && h.letter.sender == sender)
            })
            .cloned()
            .collect())
    }

    async fn find_visible_to(&self, user: UserId) -> Result<Vec<ModificationRequest>, RepositoryError> {
        let modifications = self.modifications.read();
        let letters = self.letters.letters.read();
        Ok(modifications
            .iter()
            .filter(|m| {
                letters.iter().any(|h| {
                    h.letter.id == m.letter
                        && (h.letter.sender == user || h.letter.receiver == user)
                })
            })
            .cloned()
            .collect())
    }

    async fn commit_approval(&self, request: &ModificationRequest) -> Result<LetterVersion, RepositoryError> {
        if request.status != ModificationStatus::Approved {
            return Err(RepositoryError::Unknown(format!(
                "commit_approval called with {} modification",
                request.status
            )));
        }

        // Both locks are held until the status and the version are in place
        let mut modifications = self.modifications.write();
        let mut letters = self.letters.letters.write();

        let stored = modifications
            .iter_mut()
            .find(|m| m.id == request.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("modification {}", request.id)))?;
        if !stored.is_pending() {
            return Err(Self::stale(stored));
        }
        let history = letters
            .iter_mut()
            .find(|h| h.letter.id == request.letter)
            .ok_or_else(|| RepositoryError::NotFound(format!("letter {}", request.letter)))?;

        let version = LetterVersion::from_approved_modification(request, history.next_sequence());
        history.versions.push(version.clone());
        stored.status = ModificationStatus::Approved;
        stored.approved_at = request.approved_at;
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

        let mut modifications = self.modifications.write();
        let stored = modifications
            .iter_mut()
            .find(|m| m.id == request.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("modification {}", request.id)))?;
        if !stored.is_pending() {
            return Err(Self::stale(stored));
        }
        stored.status = ModificationStatus::Rejected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_connection_insert_rejects_reverse_duplicate() {
        let repo = InMemoryConnectionRepository::new();
        let a = UserId::new();
        let b = UserId::new();

        repo.insert(&Connection::new(a, b)).await.unwrap();
        let err = repo.insert(&Connection::new(b, a)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_mark_accepted_is_compare_and_set() {
        let repo = InMemoryConnectionRepository::new();
        let conn = Connection::new(UserId::new(), UserId::new());
        repo.insert(&conn).await.unwrap();

        repo.mark_accepted(conn.id).await.unwrap();
        let err = repo.mark_accepted(conn.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Stale(_)));
        assert!(repo.find_by_id(conn.id).await.unwrap().unwrap().is_accepted());
    }

    #[tokio::test]
    async fn test_commit_approval_appends_version_once() {
        let letters = InMemoryLetterRepository::new();
        let modifications = InMemoryModificationRepository::new(letters.clone());
        let sender = UserId::new();
        let receiver = UserId::new();
        let history = LetterHistory::compose(sender, receiver, "hello");
        letters.create(&history).await.unwrap();

        let mut request = ModificationRequest::new(history.letter.id, receiver, "hello there");
        modifications.insert(&request).await.unwrap();
        request.approve(Utc::now()).unwrap();

        let version = modifications.commit_approval(&request).await.unwrap();
        assert_eq!(version.sequence, 2);
        assert_eq!(version.created_by, receiver);

        let err = modifications.commit_approval(&request).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Stale(_)));

        let stored = letters.find_by_id(history.letter.id).await.unwrap().unwrap();
        assert_eq!(stored.versions.len(), 2);
    }

    #[tokio::test]
    async fn test_commit_rejection_after_approval_is_stale() {
        let letters = InMemoryLetterRepository::new();
        let modifications = InMemoryModificationRepository::new(letters.clone());
        let history = LetterHistory::compose(UserId::new(), UserId::new(), "hello");
        letters.create(&history).await.unwrap();

        let pending = ModificationRequest::new(history.letter.id, history.letter.receiver, "edit");
        modifications.insert(&pending).await.unwrap();

        let mut approved = pending.clone();
        approved.approve(Utc::now()).unwrap();
        modifications.commit_approval(&approved).await.unwrap();

        let mut rejected = pending;
        rejected.reject().unwrap();
        let err = modifications.commit_rejection(&rejected).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Stale(_)));
    }

    #[tokio::test]
    async fn test_letters_with_equal_timestamps_list_by_id() {
        let repo = InMemoryLetterRepository::new();
        let sender = UserId::new();
        let receiver = UserId::new();

        let first = LetterHistory::compose(sender, receiver, "one");
        let mut second = LetterHistory::compose(sender, receiver, "two");
        second.letter.created_at = first.letter.created_at;
        let (low, high) = if first.letter.id.0 < second.letter.id.0 {
            (first, second)
        } else {
            (second, first)
        };
        repo.create(&high).await.unwrap();
        repo.create(&low).await.unwrap();

        let thread = repo.find_between(receiver, sender).await.unwrap();
        assert_eq!(thread[0].letter.id, low.letter.id);
        assert_eq!(thread[1].letter.id, high.letter.id);

        let listed = repo.find_for_user(sender).await.unwrap();
        assert_eq!(listed[0].letter.id, low.letter.id);
    }

    #[tokio::test]
    async fn test_user_search_excludes_caller() {
        let repo = InMemoryUserRepository::new();
        let alice = User::new("alice");
        let alicia = User::new("Alicia");
        repo.save(&alice).await.unwrap();
        repo.save(&alicia).await.unwrap();
        repo.save(&User::new("bob")).await.unwrap();

        let found = repo.search("ALI", Some(alice.id)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, alicia.id);

        let err = repo.save(&User::new("alice")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
