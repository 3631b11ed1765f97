// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use crate::domain::letter::LetterId;
use crate::domain::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModificationId(pub Uuid);

impl ModificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ModificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationStatus::Pending => "PENDING",
            ModificationStatus::Approved => "APPROVED",
            ModificationStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ModificationStatus::Pending)
    }
}

impl std::fmt::Display for ModificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown modification status: {0}")]
pub struct UnknownModificationStatus(pub String);

impl FromStr for ModificationStatus {
    type Err = UnknownModificationStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ModificationStatus::Pending),
            "APPROVED" => Ok(ModificationStatus::Approved),
            "REJECTED" => Ok(ModificationStatus::Rejected),
            other => Err(UnknownModificationStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModificationError {
    #[error("modification is already {0}")]
    AlreadyResolved(ModificationStatus),
}

/// A proposed new version of a letter awaiting the sender's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationRequest {
    pub id: ModificationId,
    pub letter: LetterId,
    pub requested_by: UserId,
    pub proposed_content: String,
    pub status: ModificationStatus,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl ModificationRequest {
    pub fn new(letter: LetterId, requested_by: UserId, proposed_content: impl Into<String>) -> Self {
        Self {
            id: ModificationId::new(),
            letter,
            requested_by,
            proposed_content: proposed_content.into(),
            status: ModificationStatus::Pending,
            requested_at: Utc::now(),
            approved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ModificationStatus::Pending
    }

    /// Pure status transition. Appending the resulting version is the
    /// workflow's job and must be committed together with this change.
    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), ModificationError> {
        if self.status.is_terminal() {
            return Err(ModificationError::AlreadyResolved(self.status));
        }
        self.status = ModificationStatus::Approved;
        self.approved_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), ModificationError> {
        if self.status.is_terminal() {
            return Err(ModificationError::AlreadyResolved(self.status));
        }
        self.status = ModificationStatus::Rejected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_stamps_approved_at() {
        let mut request = ModificationRequest::new(LetterId::new(), UserId::new(), "edit");
        let now = Utc::now();
        request.approve(now).unwrap();
        assert_eq!(request.status, ModificationStatus::Approved);
        assert_eq!(request.approved_at, Some(now));
    }

    #[test]
    fn test_reject_leaves_approved_at_unset() {
        let mut request = ModificationRequest::new(LetterId::new(), UserId::new(), "edit");
        request.reject().unwrap();
        assert_eq!(request.status, ModificationStatus::Rejected);
        assert!(request.approved_at.is_none());
    }

    #[test]
    fn test_terminal_states_do_not_transition() {
        let mut approved = ModificationRequest::new(LetterId::new(), UserId::new(), "edit");
        approved.approve(Utc::now()).unwrap();
        assert_eq!(
            approved.reject(),
            Err(ModificationError::AlreadyResolved(ModificationStatus::Approved))
        );
        assert!(approved.approve(Utc::now()).is_err());

        let mut rejected = ModificationRequest::new(LetterId::new(), UserId::new(), "edit");
        rejected.reject().unwrap();
        assert_eq!(
            rejected.approve(Utc::now()),
            Err(ModificationError::AlreadyResolved(ModificationStatus::Rejected))
        );
    }

    #[test]
    fn test_status_parsing_is_closed() {
        for status in [
            ModificationStatus::Pending,
            ModificationStatus::Approved,
            ModificationStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ModificationStatus>(), Ok(status));
        }
        assert!("CANCELLED".parse::<ModificationStatus>().is_err());
    }
}
