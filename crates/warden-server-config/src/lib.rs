// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the warden server.
//!
//! Sources are merged in precedence order: built-in defaults, then the TOML
//! config file (`/etc/warden/server.toml` unless overridden), then
//! `WARDEN_SERVER_*` environment variables.
//!
//! ```ignore
//! use warden_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("keys live in {}", config.vault.key_dir.display());
//! ```

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::{load_secret_env, SecretEnvError};
pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Minimum length in bytes of the session token signing secret.
pub const MIN_SIGNING_SECRET_LEN: usize = 32;

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub vault: VaultConfig,
	pub token: TokenConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARDEN_SERVER_*`)
/// 2. Config file (`/etc/warden/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let vault = layer.vault.unwrap_or_default().finalize();
	let token = layer.token.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&vault, &token)?;

	info!(
		database = %database.url,
		key_dir = %vault.key_dir.display(),
		scratch_dir = %vault.scratch_dir.display(),
		engine_timeout_secs = vault.engine_timeout_secs,
		token_ttl_minutes = token.default_ttl_minutes,
		signing_secret_configured = token.signing_secret.is_some(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		vault,
		token,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(vault: &VaultConfig, token: &TokenConfig) -> Result<(), ConfigError> {
	if vault.engine_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"WARDEN_SERVER_VAULT_ENGINE_TIMEOUT_SECS must be greater than zero".to_string(),
		));
	}

	if token.default_ttl_minutes == 0 {
		return Err(ConfigError::Validation(
			"WARDEN_SERVER_TOKEN_TTL_MINUTES must be greater than zero".to_string(),
		));
	}

	if token.default_ttl_minutes > token.max_ttl_minutes {
		return Err(ConfigError::Validation(format!(
			"default token TTL ({} min) exceeds the maximum ({} min)",
			token.default_ttl_minutes, token.max_ttl_minutes
		)));
	}

	if token.max_ttl_minutes > TTL_CEILING_MINUTES {
		return Err(ConfigError::Validation(format!(
			"maximum token TTL ({} min) exceeds the ceiling ({TTL_CEILING_MINUTES} min)",
			token.max_ttl_minutes
		)));
	}

	if let Some(secret) = &token.signing_secret {
		if secret.expose().len() < MIN_SIGNING_SECRET_LEN {
			return Err(ConfigError::Validation(format!(
				"WARDEN_SERVER_TOKEN_SECRET must be at least {MIN_SIGNING_SECRET_LEN} bytes"
			)));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_common_secret::SecretString;

	#[test]
	fn test_defaults_are_valid() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.database.url, "sqlite:./warden.db");
		assert_eq!(config.token.default_ttl_minutes, 30);
		assert!(config.token.signing_secret.is_none());
	}

	#[test]
	fn test_zero_engine_timeout_rejected() {
		let layer = ServerConfigLayer {
			vault: Some(VaultConfigLayer {
				engine_timeout_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_ttl_above_max_rejected() {
		let layer = ServerConfigLayer {
			token: Some(TokenConfigLayer {
				default_ttl_minutes: Some(120),
				max_ttl_minutes: Some(60),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_max_ttl_above_ceiling_rejected() {
		let layer = ServerConfigLayer {
			token: Some(TokenConfigLayer {
				max_ttl_minutes: Some(TTL_CEILING_MINUTES + 1),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("exceeds the ceiling"));

		let layer = ServerConfigLayer {
			token: Some(TokenConfigLayer {
				max_ttl_minutes: Some(TTL_CEILING_MINUTES),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer).is_ok());
	}

	#[test]
	fn test_short_secret_rejected() {
		let layer = ServerConfigLayer {
			token: Some(TokenConfigLayer {
				signing_secret: Some(SecretString::from("short")),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("at least 32 bytes"));
	}

	#[test]
	fn test_file_layer_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		std::io::Write::write_all(
			&mut file,
			b"[database]\nurl = \"sqlite:/tmp/warden-config-test.db\"\n",
		)
		.unwrap();

		let mut merged = ServerConfigLayer::default();
		merged.merge(TomlSource::new(file.path()).load().unwrap());
		let config = finalize(merged).unwrap();
		assert_eq!(config.database.url, "sqlite:/tmp/warden-config-test.db");
	}
}
