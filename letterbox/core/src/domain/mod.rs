// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Entities, value objects and repository contracts for connections,
//! letters and their proposed modifications.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure state transitions and access predicates, no I/O

pub mod access;
pub mod config;
pub mod connection;
pub mod letter;
pub mod modification;
pub mod repository;
pub mod user;
