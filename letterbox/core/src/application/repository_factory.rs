// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on storage backend
//! configuration, and wires them into the application services.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Keep the domain free of infrastructure choices

use std::sync::Arc;
use sqlx::PgPool;

use crate::application::connection_registry::{ConnectionRegistry, StandardConnectionRegistry};
use crate::application::letter_store::{LetterStore, StandardLetterStore};
use crate::application::modification_workflow::{ModificationWorkflow, StandardModificationWorkflow};
use crate::application::user_directory::{StandardUserDirectory, UserDirectory};
use crate::domain::repository::{
    ConnectionRepository, LetterRepository, ModificationRepository, RepositoryError, StorageBackend,
    UserRepository,
};
use crate::infrastructure::repositories::{
    InMemoryConnectionRepository, InMemoryLetterRepository, InMemoryModificationRepository,
    InMemoryUserRepository,
};
use crate::infrastructure::repositories::postgres_connection::PostgresConnectionRepository;
use crate::infrastructure::repositories::postgres_letter::PostgresLetterRepository;
use crate::infrastructure::repositories::postgres_modification::PostgresModificationRepository;
use crate::infrastructure::repositories::postgres_user::PostgresUserRepository;

/// The four repositories one running instance works against.
#[derive(Clone)]
pub struct LetterboxRepositories {
    pub users: Arc<dyn UserRepository>,
    pub connections: Arc<dyn ConnectionRepository>,
    pub letters: Arc<dyn LetterRepository>,
    pub modifications: Arc<dyn ModificationRepository>,
}

impl LetterboxRepositories {
    /// Build every repository for `backend`.
    ///
    /// The in-memory modification store shares the letter store so that an
    /// approval can append its version under the same locks.
    pub fn create(backend: &StorageBackend, pool: Option<PgPool>) -> Result<Self, RepositoryError> {
        match backend {
            StorageBackend::InMemory => Ok(Self::in_memory()),
            StorageBackend::PostgreSQL(_) => {
                let pool = pool.ok_or_else(|| {
                    RepositoryError::Database("PostgreSQL backend selected without a connection pool".to_string())
                })?;
                Ok(Self {
                    users: Arc::new(PostgresUserRepository::new(pool.clone())),
                    connections: Arc::new(PostgresConnectionRepository::new(pool.clone())),
                    letters: Arc::new(PostgresLetterRepository::new(pool.clone())),
                    modifications: Arc::new(PostgresModificationRepository::new(pool)),
                })
            }
        }
    }

    pub fn in_memory() -> Self {
        let letters = InMemoryLetterRepository::new();
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            connections: Arc::new(InMemoryConnectionRepository::new()),
            modifications: Arc::new(InMemoryModificationRepository::new(letters.clone())),
            letters: Arc::new(letters),
        }
    }
}

/// Application services sharing one set of repositories.
#[derive(Clone)]
pub struct LetterboxServices {
    pub users: Arc<dyn UserDirectory>,
    pub connections: Arc<dyn ConnectionRegistry>,
    pub letters: Arc<dyn LetterStore>,
    pub modifications: Arc<dyn ModificationWorkflow>,
}

impl LetterboxServices {
    pub fn new(repos: LetterboxRepositories) -> Self {
        let connections: Arc<dyn ConnectionRegistry> = Arc::new(StandardConnectionRegistry::new(
            repos.connections.clone(),
            repos.users.clone(),
        ));
        Self {
            users: Arc::new(StandardUserDirectory::new(repos.users.clone())),
            letters: Arc::new(StandardLetterStore::new(
                connections.clone(),
                repos.letters.clone(),
                repos.modifications.clone(),
            )),
            modifications: Arc::new(StandardModificationWorkflow::new(repos.letters, repos.modifications)),
            connections,
        }
    }
}
