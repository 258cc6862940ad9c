// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Adapters for the domain ports: job stores, the EasyRSA issuer, the profile
//! directory and status feed sources.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements domain ports against PostgreSQL, the filesystem,
//!   child processes and TCP

pub mod db;
pub mod easyrsa;
pub mod profile_store;
pub mod repositories;
pub mod status_source;
