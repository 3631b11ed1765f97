// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod error;
pub mod user_directory;
pub mod connection_registry;
pub mod letter_store;
pub mod modification_workflow;
pub mod repository_factory;

// Re-export services for convenience
pub use error::{ServiceError, ServiceResult};
pub use user_directory::{UserDirectory, StandardUserDirectory};
pub use connection_registry::{ConnectionRegistry, StandardConnectionRegistry};
pub use letter_store::{LetterStore, StandardLetterStore};
pub use modification_workflow::{ModificationWorkflow, StandardModificationWorkflow, ApprovedModification};
pub use repository_factory::{LetterboxRepositories, LetterboxServices};
