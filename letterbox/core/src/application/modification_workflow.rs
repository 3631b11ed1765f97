// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Modification Workflow
//!
//! Proposes, approves and rejects edits to a letter.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Authorization and precondition checks around
//!   [`ModificationRequest`] transitions
//! - **Collaborators:**
//!   - Domain: ModificationRequest aggregate, access predicates
//!   - Infrastructure: LetterRepository, ModificationRepository
//!
//! # State Machine
//!
//! ```text
//!            ┌──(sender approves)──► APPROVED  + new LetterVersion
//! PENDING ───┤
//!            └──(sender rejects)───► REJECTED
//! ```
//!
//! Either participant may propose. Only the letter's original sender may
//! resolve, whoever proposed the edit. Distinct pending requests on the same
//! letter are independent; the most recently approved one is current.
//!
//! The status change and the version append are committed together by
//! [`ModificationRepository::commit_approval`]. When two approvals race, the
//! store accepts exactly one and the other surfaces as `InvalidState`.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use crate::application::error::{ServiceError, ServiceResult};
use crate::domain::access::{is_approval_authority, is_participant};
use crate::domain::letter::{LetterId, LetterVersion};
use crate::domain::modification::{ModificationId, ModificationRequest};
use crate::domain::repository::{LetterRepository, ModificationRepository};
use crate::domain::user::UserId;

/// Outcome of a successful approval: the resolved request and the version it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedModification {
    pub modification: ModificationRequest,
    pub version: LetterVersion,
}

#[async_trait]
pub trait ModificationWorkflow: Send + Sync {
    /// Propose new content for a letter on behalf of one of its participants.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the letter does not exist
    /// - `Forbidden` if `requested_by` is neither sender nor receiver
    /// - `InvalidState` if the letter has no approved version yet
    async fn propose(
        &self,
        letter_id: LetterId,
        requested_by: UserId,
        proposed_content: &str,
    ) -> ServiceResult<ModificationRequest>;

    /// Approve a pending request. `acting_user` must be the letter's sender.
    async fn approve(&self, modification_id: ModificationId, acting_user: UserId) -> ServiceResult<ApprovedModification>;

    /// Reject a pending request. Same guards as [`ModificationWorkflow::approve`]; no version is created.
    async fn reject(&self, modification_id: ModificationId, acting_user: UserId) -> ServiceResult<ModificationRequest>;

    /// Pending requests on letters `user` sent, i.e. the ones waiting on them.
    async fn pending_modifications_awaiting_approval_by(&self, user: UserId) -> ServiceResult<Vec<ModificationRequest>>;

    async fn modifications_visible_to(&self, user: UserId) -> ServiceResult<Vec<ModificationRequest>>;
}

pub struct StandardModificationWorkflow {
    letters: Arc<dyn LetterRepository>,
    modifications: Arc<dyn ModificationRepository>,
}

impl StandardModificationWorkflow {
    pub fn new(letters: Arc<dyn LetterRepository>, modifications: Arc<dyn ModificationRepository>) -> Self {
        Self {
            letters,
            modifications,
        }
    }

    /// Load a request and its letter, then check `acting_user` may resolve it.
    async fn load_for_resolution(
        &self,
        modification_id: ModificationId,
        acting_user: UserId,
    ) -> ServiceResult<ModificationRequest> {
        let request = self
            .modifications
            .find_by_id(modification_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("modification {}", modification_id)))?;

        // A request never outlives its letter
        let history = self.letters.find_by_id(request.letter).await?.ok_or_else(|| {
            ServiceError::InvariantViolation(format!(
                "modification {} references missing letter {}",
                request.id, request.letter
            ))
        })?;

        if !is_approval_authority(&history.letter, acting_user) {
            warn!(
                modification_id = %modification_id,
                user = %acting_user,
                "Resolution attempted by someone other than the sender"
            );
            return Err(ServiceError::Forbidden(
                "only the letter's sender can approve or reject modifications".to_string(),
            ));
        }

        Ok(request)
    }
}

#[async_trait]
impl ModificationWorkflow for StandardModificationWorkflow {
    async fn propose(
        &self,
        letter_id: LetterId,
        requested_by: UserId,
        proposed_content: &str,
    ) -> ServiceResult<ModificationRequest> {
        let history = self
            .letters
            .find_by_id(letter_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("letter {}", letter_id)))?;

        if !is_participant(&history.letter, requested_by) {
            warn!(letter_id = %letter_id, user = %requested_by, "Proposal from non-participant");
            return Err(ServiceError::Forbidden(
                "user is not a participant in this letter".to_string(),
            ));
        }
        if !history.has_approved_version() {
            return Err(ServiceError::InvalidState(format!(
                "letter {} has no approved content to modify",
                letter_id
            )));
        }

        let request = ModificationRequest::new(letter_id, requested_by, proposed_content);
        self.modifications.insert(&request).await?;

        metrics::counter!("letterbox_modifications_proposed_total").increment(1);
        info!(
            modification_id = %request.id,
            letter_id = %letter_id,
            requested_by = %requested_by,
            "Modification proposed"
        );
        Ok(request)
    }

    async fn approve(&self, modification_id: ModificationId, acting_user: UserId) -> ServiceResult<ApprovedModification> {
        let mut request = self.load_for_resolution(modification_id, acting_user).await?;

        request.approve(Utc::now())?;
        let version = self.modifications.commit_approval(&request).await?;

        metrics::counter!("letterbox_modifications_resolved_total", "outcome" => "approved").increment(1);
        info!(
            modification_id = %modification_id,
            letter_id = %request.letter,
            sequence = version.sequence,
            "Modification approved"
        );
        Ok(ApprovedModification {
            modification: request,
            version,
        })
    }

    async fn reject(&self, modification_id: ModificationId, acting_user: UserId) -> ServiceResult<ModificationRequest> {
        let mut request = self.load_for_resolution(modification_id, acting_user).await?;

        request.reject()?;
        self.modifications.commit_rejection(&request).await?;

        metrics::counter!("letterbox_modifications_resolved_total", "outcome" => "rejected").increment(1);
        info!(modification_id = %modification_id, letter_id = %request.letter, "Modification rejected");
        Ok(request)
    }

    async fn pending_modifications_awaiting_approval_by(&self, user: UserId) -> ServiceResult<Vec<ModificationRequest>> {
        Ok(self.modifications.find_pending_for_sender(user).await?)
    }

    async fn modifications_visible_to(&self, user: UserId) -> ServiceResult<Vec<ModificationRequest>> {
        Ok(self.modifications.find_visible_to(user).await?)
    }
}
