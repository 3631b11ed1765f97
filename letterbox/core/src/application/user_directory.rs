// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! User Directory
//!
//! Minimal registry of the users the core refers to by id. Credentials and
//! sessions stay with the authentication collaborator.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use crate::application::error::{ServiceError, ServiceResult};
use crate::domain::repository::UserRepository;
use crate::domain::user::{User, UserId};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Register a username. Leading and trailing whitespace is ignored.
    async fn register(&self, username: &str) -> ServiceResult<User>;

    async fn find(&self, id: UserId) -> ServiceResult<User>;

    /// Users whose name contains `fragment` (case-insensitive), minus the caller
    async fn search(&self, fragment: &str, excluding: Option<UserId>) -> ServiceResult<Vec<User>>;
}

pub struct StandardUserDirectory {
    users: Arc<dyn UserRepository>,
}

impl StandardUserDirectory {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for StandardUserDirectory {
    async fn register(&self, username: &str) -> ServiceResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ServiceError::InvalidOperation("username cannot be empty".to_string()));
        }
        if self.users.find_by_username(username).await?.is_some() {
            return Err(ServiceError::Conflict(format!("username '{}' is taken", username)));
        }

        let user = User::new(username);
        self.users.save(&user).await?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    async fn find(&self, id: UserId) -> ServiceResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", id)))
    }

    async fn search(&self, fragment: &str, excluding: Option<UserId>) -> ServiceResult<Vec<User>> {
        Ok(self.users.search(fragment.trim(), excluding).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryUserRepository;

    fn directory() -> StandardUserDirectory {
        StandardUserDirectory::new(Arc::new(InMemoryUserRepository::new()))
    }

    #[tokio::test]
    async fn test_register_trims_and_rejects_duplicates() {
        let dir = directory();
        let alice = dir.register("  alice ").await.unwrap();
        assert_eq!(alice.username, "alice");

        let err = dir.register("alice").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_blank_username() {
        let err = directory().register("   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_find_unknown_user() {
        let err = directory().find(UserId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
