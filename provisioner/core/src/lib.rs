// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OpenVPN Client Provisioner Core
//!
//! Asynchronous certificate provisioning with a durable job store, secret-gated
//! profile retrieval, and live tunnel address lookup from the VPN status feed.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, job pipeline and HTTP surface shared by the
//!   gateway and worker binaries

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
