// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Connection Registry
//!
//! Application service tracking pairwise connection requests between users.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Gate and perform connection state transitions
//! - **Collaborators:**
//!   - Domain: Connection aggregate, access predicates
//!   - Infrastructure: ConnectionRepository, UserRepository
//!
//! # Lifecycle
//!
//! ```text
//! request_connection ──► PENDING ──(receiver accepts)──► ACCEPTED
//! ```
//!
//! A pair of users has at most one connection regardless of who asked
//! first. Connections are never deleted.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use crate::application::error::{ServiceError, ServiceResult};
use crate::domain::access::is_connection_party;
use crate::domain::connection::{Connection, ConnectionId, ConnectionStatus};
use crate::domain::repository::{ConnectionRepository, UserRepository};
use crate::domain::user::UserId;

#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Send a connection request from `requester` to `receiver`.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` when both ids are the same user
    /// - `NotFound` when either user is unknown
    /// - `Conflict` when the two users already share a connection
    async fn request_connection(&self, requester: UserId, receiver: UserId) -> ServiceResult<Connection>;

    /// Accept a pending request. Only its receiver may do so, and only once.
    async fn accept_connection(&self, connection_id: ConnectionId, acting_user: UserId) -> ServiceResult<Connection>;

    /// True iff an ACCEPTED connection links the two users.
    async fn is_connected(&self, a: UserId, b: UserId) -> ServiceResult<bool>;

    /// Incoming requests awaiting `user`'s decision
    async fn pending_connections_for(&self, user: UserId) -> ServiceResult<Vec<Connection>>;

    async fn accepted_connections_for(&self, user: UserId) -> ServiceResult<Vec<Connection>>;
}

pub struct StandardConnectionRegistry {
    connections: Arc<dyn ConnectionRepository>,
    users: Arc<dyn UserRepository>,
}

impl StandardConnectionRegistry {
    pub fn new(connections: Arc<dyn ConnectionRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { connections, users }
    }

    async fn ensure_user_exists(&self, user: UserId) -> ServiceResult<()> {
        match self.users.find_by_id(user).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(format!("user {}", user))),
        }
    }
}

#[async_trait]
impl ConnectionRegistry for StandardConnectionRegistry {
    async fn request_connection(&self, requester: UserId, receiver: UserId) -> ServiceResult<Connection> {
        if requester == receiver {
            return Err(ServiceError::InvalidOperation(
                "cannot request a connection with yourself".to_string(),
            ));
        }
        self.ensure_user_exists(requester).await?;
        self.ensure_user_exists(receiver).await?;

        if let Some(existing) = self.connections.find_between(requester, receiver).await? {
            return Err(ServiceError::Conflict(format!(
                "connection {} already links these users ({})",
                existing.id, existing.status
            )));
        }

        // The store re-checks the pair, so a racing request still loses with Conflict
        let connection = Connection::new(requester, receiver);
        self.connections.insert(&connection).await?;

        metrics::counter!("letterbox_connections_requested_total").increment(1);
        info!(
            connection_id = %connection.id,
            requester = %requester,
            receiver = %receiver,
            "Connection requested"
        );
        Ok(connection)
    }

    async fn accept_connection(&self, connection_id: ConnectionId, acting_user: UserId) -> ServiceResult<Connection> {
        let mut connection = self
            .connections
            .find_by_id(connection_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("connection {}", connection_id)))?;

        if !is_connection_party(&connection, acting_user) {
            warn!(connection_id = %connection_id, user = %acting_user, "Accept attempted by outsider");
            return Err(ServiceError::Forbidden(
                "user is not a party to this connection".to_string(),
            ));
        }
        if connection.receiver != acting_user {
            warn!(connection_id = %connection_id, user = %acting_user, "Accept attempted by requester");
            return Err(ServiceError::Forbidden(
                "only the receiver can accept a connection request".to_string(),
            ));
        }

        connection.accept()?;
        self.connections.mark_accepted(connection_id).await?;

        metrics::counter!("letterbox_connections_accepted_total").increment(1);
        info!(connection_id = %connection_id, "Connection accepted");
        Ok(connection)
    }

    async fn is_connected(&self, a: UserId, b: UserId) -> ServiceResult<bool> {
        Ok(self
            .connections
            .find_between(a, b)
            .await?
            .map(|c| c.is_accepted())
            .unwrap_or(false))
    }

    async fn pending_connections_for(&self, user: UserId) -> ServiceResult<Vec<Connection>> {
        Ok(self
            .connections
            .find_for_user(user)
            .await?
            .into_iter()
            .filter(|c| c.receiver == user && c.status == ConnectionStatus::Pending)
            .collect())
    }

    async fn accepted_connections_for(&self, user: UserId) -> ServiceResult<Vec<Connection>> {
        Ok(self
            .connections
            .find_for_user(user)
            .await?
            .into_iter()
            .filter(|c| c.is_accepted())
            .collect())
    }
}
