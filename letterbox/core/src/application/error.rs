// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Errors returned by the application services.
//!
//! Every variant is raised at the point of detection and handed to the
//! caller unchanged; the services never retry. The presentation layer maps
//! each kind to a user-facing status.

use thiserror::Error;
use crate::domain::connection::ConnectionError;
use crate::domain::modification::ModificationError;
use crate::domain::repository::RepositoryError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Acting user lacks authority for the transition
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Entity is not in a state that permits the transition
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Structurally nonsensical request
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Would violate a uniqueness invariant
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal consistency failure. Always a defect.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            // A compare-and-set lost against a concurrent transition
            RepositoryError::Stale(msg) => ServiceError::InvalidState(msg),
            other => ServiceError::Repository(other),
        }
    }
}

impl From<ConnectionError> for ServiceError {
    fn from(err: ConnectionError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<ModificationError> for ServiceError {
    fn from(err: ModificationError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl ServiceError {
    /// Whether the message can be shown to the caller as-is.
    pub fn is_user_actionable(&self) -> bool {
        !matches!(
            self,
            ServiceError::InvariantViolation(_) | ServiceError::Repository(_)
        )
    }
}
