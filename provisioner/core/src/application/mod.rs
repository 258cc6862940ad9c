// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Use cases composed from domain ports: the gateway-facing provisioning
//! service, the provisioning worker and backend selection.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates domain objects and infrastructure adapters

pub mod provisioning;
pub mod repository_factory;
pub mod worker;
