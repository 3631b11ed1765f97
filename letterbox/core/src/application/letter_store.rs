// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Letter Store
//!
//! Creates letters between connected users and answers questions about
//! their current content.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Letter creation and read projections
//! - **Collaborators:**
//!   - Application: ConnectionRegistry (connection gate)
//!   - Infrastructure: LetterRepository, ModificationRepository
//!
//! Content is never edited in place. A letter's current content is the
//! approved version with the highest sequence; new versions only arrive
//! through [`crate::application::modification_workflow`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};
use crate::application::connection_registry::ConnectionRegistry;
use crate::application::error::{ServiceError, ServiceResult};
use crate::domain::access::is_participant;
use crate::domain::letter::{LetterHistory, LetterId, LetterVersion};
use crate::domain::repository::{LetterRepository, ModificationRepository};
use crate::domain::user::UserId;

#[async_trait]
pub trait LetterStore: Send + Sync {
    /// Write a new letter from `sender` to `receiver`.
    ///
    /// The two users must share an ACCEPTED connection. The letter starts
    /// with a single approved version authored by the sender.
    async fn create_letter(&self, sender: UserId, receiver: UserId, content: &str) -> ServiceResult<LetterHistory>;

    /// Latest approved version of a letter.
    async fn current_content(&self, letter_id: LetterId) -> ServiceResult<LetterVersion>;

    /// All letters exchanged between two users in either direction, oldest first.
    async fn list_thread(&self, a: UserId, b: UserId) -> ServiceResult<Vec<LetterHistory>>;

    async fn has_pending_modification(&self, letter_id: LetterId) -> ServiceResult<bool>;

    /// Letters where `user` is sender or receiver
    async fn letters_for(&self, user: UserId) -> ServiceResult<Vec<LetterHistory>>;

    /// Fetch one letter on behalf of `acting_user`, who must be a participant.
    async fn letter_for(&self, letter_id: LetterId, acting_user: UserId) -> ServiceResult<LetterHistory>;
}

/// Resolve the current version, treating a letter with no approved version
/// as a broken store rather than an empty letter.
pub(crate) fn current_version_of(history: &LetterHistory) -> ServiceResult<LetterVersion> {
    match history.current_version() {
        Some(version) => Ok(version.clone()),
        None => {
            error!(letter_id = %history.letter.id, "Letter has no approved version");
            Err(ServiceError::InvariantViolation(format!(
                "letter {} has no approved version",
                history.letter.id
            )))
        }
    }
}

pub struct StandardLetterStore {
    connections: Arc<dyn ConnectionRegistry>,
    letters: Arc<dyn LetterRepository>,
    modifications: Arc<dyn ModificationRepository>,
}

impl StandardLetterStore {
    pub fn new(
        connections: Arc<dyn ConnectionRegistry>,
        letters: Arc<dyn LetterRepository>,
        modifications: Arc<dyn ModificationRepository>,
    ) -> Self {
        Self {
            connections,
            letters,
            modifications,
        }
    }

    async fn load(&self, letter_id: LetterId) -> ServiceResult<LetterHistory> {
        self.letters
            .find_by_id(letter_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("letter {}", letter_id)))
    }
}

#[async_trait]
impl LetterStore for StandardLetterStore {
    async fn create_letter(&self, sender: UserId, receiver: UserId, content: &str) -> ServiceResult<LetterHistory> {
        if !self.connections.is_connected(sender, receiver).await? {
            warn!(sender = %sender, receiver = %receiver, "Letter refused: users are not connected");
            return Err(ServiceError::Forbidden(
                "sender and receiver are not connected".to_string(),
            ));
        }

        let history = LetterHistory::compose(sender, receiver, content);
        self.letters.create(&history).await?;

        metrics::counter!("letterbox_letters_created_total").increment(1);
        info!(letter_id = %history.letter.id, sender = %sender, receiver = %receiver, "Letter created");
        Ok(history)
    }

    async fn current_content(&self, letter_id: LetterId) -> ServiceResult<LetterVersion> {
        let history = self.load(letter_id).await?;
        current_version_of(&history)
    }

    async fn list_thread(&self, a: UserId, b: UserId) -> ServiceResult<Vec<LetterHistory>> {
        Ok(self.letters.find_between(a, b).await?)
    }

    async fn has_pending_modification(&self, letter_id: LetterId) -> ServiceResult<bool> {
        // Unknown letters are reported rather than answered with false
        self.load(letter_id).await?;
        Ok(self.modifications.has_pending(letter_id).await?)
    }

    async fn letters_for(&self, user: UserId) -> ServiceResult<Vec<LetterHistory>> {
        Ok(self.letters.find_for_user(user).await?)
    }

    async fn letter_for(&self, letter_id: LetterId, acting_user: UserId) -> ServiceResult<LetterHistory> {
        let history = self.load(letter_id).await?;
        if !is_participant(&history.letter, acting_user) {
            return Err(ServiceError::Forbidden(
                "user is not a participant in this letter".to_string(),
            ));
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::connection_registry::StandardConnectionRegistry;
    use crate::domain::modification::ModificationRequest;
    use crate::domain::repository::UserRepository;
    use crate::domain::user::User;
    use crate::infrastructure::repositories::{
        InMemoryConnectionRepository, InMemoryLetterRepository, InMemoryModificationRepository,
        InMemoryUserRepository,
    };

    struct Fixture {
        store: StandardLetterStore,
        registry: Arc<StandardConnectionRegistry>,
        modifications: Arc<InMemoryModificationRepository>,
        alice: UserId,
        bob: UserId,
        carol: UserId,
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        let (alice, bob, carol) = (User::new("alice"), User::new("bob"), User::new("carol"));
        for user in [&alice, &bob, &carol] {
            users.save(user).await.unwrap();
        }
        let registry = Arc::new(StandardConnectionRegistry::new(
            Arc::new(InMemoryConnectionRepository::new()),
            users,
        ));
        let letters = InMemoryLetterRepository::new();
        let modifications = Arc::new(InMemoryModificationRepository::new(letters.clone()));
        let store = StandardLetterStore::new(registry.clone(), Arc::new(letters), modifications.clone());
        Fixture {
            store,
            registry,
            modifications,
            alice: alice.id,
            bob: bob.id,
            carol: carol.id,
        }
    }

    async fn connect(fx: &Fixture, a: UserId, b: UserId) {
        let conn = fx.registry.request_connection(a, b).await.unwrap();
        fx.registry.accept_connection(conn.id, b).await.unwrap();
    }

    #[tokio::test]
    async fn test_letter_requires_accepted_connection() {
        let fx = fixture().await;
        let err = fx.store.create_letter(fx.alice, fx.bob, "hi").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // Pending is not enough
        fx.registry.request_connection(fx.alice, fx.bob).await.unwrap();
        let err = fx.store.create_letter(fx.alice, fx.bob, "hi").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_new_letter_has_sender_authored_first_version() {
        let fx = fixture().await;
        connect(&fx, fx.alice, fx.bob).await;

        let history = fx.store.create_letter(fx.alice, fx.bob, "hello").await.unwrap();
        let current = fx.store.current_content(history.letter.id).await.unwrap();
        assert_eq!(current.content, "hello");
        assert_eq!(current.created_by, fx.alice);
        assert_eq!(current.sequence, 1);
        assert!(current.is_approved);
    }

    #[tokio::test]
    async fn test_thread_covers_both_directions() {
        let fx = fixture().await;
        connect(&fx, fx.alice, fx.bob).await;
        connect(&fx, fx.alice, fx.carol).await;

        fx.store.create_letter(fx.alice, fx.bob, "one").await.unwrap();
        fx.store.create_letter(fx.bob, fx.alice, "two").await.unwrap();
        fx.store.create_letter(fx.alice, fx.carol, "elsewhere").await.unwrap();

        let thread = fx.store.list_thread(fx.bob, fx.alice).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(fx.store.letters_for(fx.alice).await.unwrap().len(), 3);
        assert_eq!(fx.store.letters_for(fx.carol).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_letter_for_checks_participation() {
        let fx = fixture().await;
        connect(&fx, fx.alice, fx.bob).await;
        let history = fx.store.create_letter(fx.alice, fx.bob, "private").await.unwrap();

        assert!(fx.store.letter_for(history.letter.id, fx.bob).await.is_ok());
        let err = fx.store.letter_for(history.letter.id, fx.carol).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = fx.store.letter_for(LetterId::new(), fx.alice).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pending_modification_flag() {
        let fx = fixture().await;
        connect(&fx, fx.alice, fx.bob).await;
        let history = fx.store.create_letter(fx.alice, fx.bob, "draft").await.unwrap();
        assert!(!fx.store.has_pending_modification(history.letter.id).await.unwrap());

        let request = ModificationRequest::new(history.letter.id, fx.bob, "edited");
        fx.modifications.insert(&request).await.unwrap();
        assert!(fx.store.has_pending_modification(history.letter.id).await.unwrap());
    }

    #[test]
    fn test_current_version_of_empty_history_is_invariant_violation() {
        let mut history = LetterHistory::compose(UserId::new(), UserId::new(), "x");
        history.versions.clear();
        let err = current_version_of(&history).unwrap_err();
        assert!(matches!(err, ServiceError::InvariantViolation(_)));
    }
}
