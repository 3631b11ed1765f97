// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Letterbox Core
//!
//! Connections between users, letters with an approval-gated version
//! history, and the workflow that moves proposed edits through it.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services, storage adapters and
//!   the HTTP presentation adapter

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
