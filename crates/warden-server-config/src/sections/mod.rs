// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for warden-server.

pub mod database;
pub mod logging;
pub mod token;
pub mod vault;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use token::{TokenConfig, TokenConfigLayer, TTL_CEILING_MINUTES};
pub use vault::{VaultConfig, VaultConfigLayer};
