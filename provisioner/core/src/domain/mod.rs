// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure types and ports: identities, secrets, the job state machine, the job
//! store contract, the credential issuer contract and the status feed parser.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Business rules with no I/O

pub mod identity;
pub mod secret;
pub mod job;
pub mod repository;
pub mod issuer;
pub mod status_feed;
pub mod config;
