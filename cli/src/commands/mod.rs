// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the ovpnp CLI

pub mod config;
pub mod inspect;
pub mod job;
pub mod migrate;
pub mod secret;

pub use self::config::ConfigCommand;
pub use self::job::JobCommand;
pub use self::migrate::MigrateCommand;
pub use self::secret::SecretCommand;
