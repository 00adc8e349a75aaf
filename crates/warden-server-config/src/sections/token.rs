// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session token configuration.

use serde::Deserialize;
use warden_common_secret::SecretString;

pub const DEFAULT_TTL_MINUTES: u64 = 30;
pub const DEFAULT_MAX_TTL_MINUTES: u64 = 24 * 60;
/// Upper bound accepted for `max_ttl_minutes`: one year.
pub const TTL_CEILING_MINUTES: u64 = 366 * 24 * 60;

/// Session token configuration (runtime, fully resolved).
///
/// The signing secret is optional here so that commands which never touch
/// tokens (migrations, engine setup) can run without it.
#[derive(Debug, Clone)]
pub struct TokenConfig {
	pub signing_secret: Option<SecretString>,
	pub default_ttl_minutes: u64,
	pub max_ttl_minutes: u64,
}

impl Default for TokenConfig {
	fn default() -> Self {
		Self {
			signing_secret: None,
			default_ttl_minutes: DEFAULT_TTL_MINUTES,
			max_ttl_minutes: DEFAULT_MAX_TTL_MINUTES,
		}
	}
}

/// Token configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenConfigLayer {
	#[serde(default)]
	pub signing_secret: Option<SecretString>,
	#[serde(default)]
	pub default_ttl_minutes: Option<u64>,
	#[serde(default)]
	pub max_ttl_minutes: Option<u64>,
}

impl TokenConfigLayer {
	pub fn merge(&mut self, other: TokenConfigLayer) {
		if other.signing_secret.is_some() {
			self.signing_secret = other.signing_secret;
		}
		if other.default_ttl_minutes.is_some() {
			self.default_ttl_minutes = other.default_ttl_minutes;
		}
		if other.max_ttl_minutes.is_some() {
			self.max_ttl_minutes = other.max_ttl_minutes;
		}
	}

	pub fn finalize(self) -> TokenConfig {
		TokenConfig {
			signing_secret: self.signing_secret,
			default_ttl_minutes: self.default_ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES),
			max_ttl_minutes: self.max_ttl_minutes.unwrap_or(DEFAULT_MAX_TTL_MINUTES),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_have_no_secret() {
		let config = TokenConfigLayer::default().finalize();
		assert!(config.signing_secret.is_none());
		assert_eq!(config.default_ttl_minutes, 30);
		assert_eq!(config.max_ttl_minutes, 1440);
	}

	#[test]
	fn debug_output_redacts_secret() {
		let config = TokenConfigLayer {
			signing_secret: Some(SecretString::from("0123456789abcdef0123456789abcdef")),
			..Default::default()
		}
		.finalize();
		let debug = format!("{config:?}");
		assert!(!debug.contains("0123456789abcdef"));
	}
}
