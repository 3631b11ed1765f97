// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Letter Aggregate
//!
//! A [`Letter`] is one conversation thread between exactly two users. Its
//! content lives in an append-only sequence of [`LetterVersion`] snapshots.
//!
//! ## Invariants
//!
//! - A letter is created together with its first version, which is approved.
//! - Versions are never mutated or removed once written.
//! - Each version carries a per-letter `sequence` (1-based) reflecting
//!   creation order; the current content is the approved version with the
//!   highest sequence.

use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::user::UserId;
use crate::domain::modification::ModificationRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LetterId(pub Uuid);

impl LetterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for LetterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LetterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId(pub Uuid);

impl VersionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letter {
    pub id: LetterId,
    pub sender: UserId,
    pub receiver: UserId,
    pub created_at: DateTime<Utc>,
}

impl Letter {
    /// Listing order: creation time, then id so equal timestamps stay stable.
    pub fn listing_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterVersion {
    pub id: VersionId,
    pub letter: LetterId,
    pub sequence: u32,
    pub content: String,
    pub created_by: UserId,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl LetterVersion {
    /// Version produced by approving `request`. Attributed to whoever
    /// proposed the edit, not to the approver.
    pub fn from_approved_modification(request: &ModificationRequest, sequence: u32) -> Self {
        Self {
            id: VersionId::new(),
            letter: request.letter,
            sequence,
            content: request.proposed_content.clone(),
            created_by: request.requested_by,
            is_approved: true,
            created_at: request.approved_at.unwrap_or_else(Utc::now),
        }
    }
}

/// A letter paired with its full version history, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterHistory {
    pub letter: Letter,
    pub versions: Vec<LetterVersion>,
}

impl LetterHistory {
    /// Compose a new letter and its pre-approved first version.
    pub fn compose(sender: UserId, receiver: UserId, content: impl Into<String>) -> Self {
        let now = Utc::now();
        let letter = Letter {
            id: LetterId::new(),
            sender,
            receiver,
            created_at: now,
        };
        let first = LetterVersion {
            id: VersionId::new(),
            letter: letter.id,
            sequence: 1,
            content: content.into(),
            created_by: sender,
            is_approved: true,
            created_at: now,
        };
        Self {
            letter,
            versions: vec![first],
        }
    }

    /// Most recently created approved version; last one wins on ties.
    pub fn current_version(&self) -> Option<&LetterVersion> {
        self.versions
            .iter()
            .filter(|v| v.is_approved)
            .max_by_key(|v| v.sequence)
    }

    pub fn has_approved_version(&self) -> bool {
        self.versions.iter().any(|v| v.is_approved)
    }

    pub fn next_sequence(&self) -> u32 {
        self.versions.iter().map(|v| v.sequence).max().unwrap_or(0) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(history: &LetterHistory, sequence: u32, content: &str, approved: bool) -> LetterVersion {
        LetterVersion {
            id: VersionId::new(),
            letter: history.letter.id,
            sequence,
            content: content.to_string(),
            created_by: history.letter.receiver,
            is_approved: approved,
            created_at: history.letter.created_at,
        }
    }

    #[test]
    fn test_compose_creates_single_approved_version() {
        let sender = UserId::new();
        let history = LetterHistory::compose(sender, UserId::new(), "hello");

        assert_eq!(history.versions.len(), 1);
        let first = &history.versions[0];
        assert!(first.is_approved);
        assert_eq!(first.created_by, sender);
        assert_eq!(first.sequence, 1);
        assert_eq!(history.current_version().map(|v| v.content.as_str()), Some("hello"));
    }

    #[test]
    fn test_current_version_skips_unapproved() {
        let mut history = LetterHistory::compose(UserId::new(), UserId::new(), "one");
        let v2 = version(&history, 2, "two", true);
        let v3 = version(&history, 3, "three", false);
        history.versions.push(v2);
        history.versions.push(v3);

        assert_eq!(history.current_version().unwrap().content, "two");
        assert_eq!(history.next_sequence(), 4);
    }

    #[test]
    fn test_identical_timestamps_resolved_by_sequence() {
        let mut history = LetterHistory::compose(UserId::new(), UserId::new(), "one");
        // Same created_at as the first version; sequence decides.
        let v2 = version(&history, 2, "two", true);
        history.versions.insert(0, v2);

        assert_eq!(history.current_version().unwrap().content, "two");
    }

    #[test]
    fn test_no_approved_version() {
        let mut history = LetterHistory::compose(UserId::new(), UserId::new(), "one");
        history.versions[0].is_approved = false;
        assert!(!history.has_approved_version());
        assert!(history.current_version().is_none());
    }
}
