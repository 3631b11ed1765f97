// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use crate::domain::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "PENDING",
            ConnectionStatus::Accepted => "ACCEPTED",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown connection status: {0}")]
pub struct UnknownConnectionStatus(pub String);

impl FromStr for ConnectionStatus {
    type Err = UnknownConnectionStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ConnectionStatus::Pending),
            "ACCEPTED" => Ok(ConnectionStatus::Accepted),
            other => Err(UnknownConnectionStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection is {0}, expected PENDING")]
    NotPending(ConnectionStatus),
}

/// A consent relationship between two users.
///
/// The request direction is kept for display; every lookup treats the pair
/// as unordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub requester: UserId,
    pub receiver: UserId,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(requester: UserId, receiver: UserId) -> Self {
        Self {
            id: ConnectionId::new(),
            requester,
            receiver,
            status: ConnectionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// True when this connection joins `a` and `b`, in either direction.
    pub fn links(&self, a: UserId, b: UserId) -> bool {
        (self.requester == a && self.receiver == b) || (self.requester == b && self.receiver == a)
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ConnectionStatus::Accepted
    }

    /// The other party, or `None` if `user` is not on this connection.
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if self.requester == user {
            Some(self.receiver)
        } else if self.receiver == user {
            Some(self.requester)
        } else {
            None
        }
    }

    pub fn accept(&mut self) -> Result<(), ConnectionError> {
        if self.status != ConnectionStatus::Pending {
            return Err(ConnectionError::NotPending(self.status));
        }
        self.status = ConnectionStatus::Accepted;
        Ok(())
    }
}
