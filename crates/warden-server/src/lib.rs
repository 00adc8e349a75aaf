// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring for the warden-server binary.
//!
//! Turns a resolved [`ServerConfig`] into a database pool, a credential
//! vault driving the cpabe binaries, and the account services on top.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{bail, Context};
use sqlx::sqlite::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_common_secret::SecretString;
use warden_server_accounts::{CatalogService, SessionService, UserService};
use warden_server_auth::SessionTokenCodec;
use warden_server_config::{LogFormat, LoggingConfig, ServerConfig, VaultConfig};
use warden_server_db::{GroupRepository, RoleRepository, UserRepository};
use warden_server_vault::{CpabeCliEngine, CredentialVault};

pub mod version;

pub struct AppContext {
	pub config: ServerConfig,
	pub pool: SqlitePool,
	pub vault: Arc<CredentialVault>,
	pub users: Arc<UserService>,
	pub catalog: CatalogService,
}

impl AppContext {
	/// Session service over this context's users. Needs a signing secret.
	pub fn sessions(&self) -> anyhow::Result<SessionService> {
		let Some(secret) = &self.config.token.signing_secret else {
			bail!("WARDEN_SERVER_TOKEN_SECRET is not configured");
		};
		let codec = SessionTokenCodec::new(secret).context("invalid token signing secret")?;
		Ok(SessionService::new(
			self.users.clone(),
			codec,
			&self.config.token,
		))
	}
}

/// The vault for a configuration, driving the configured cpabe binaries.
pub fn build_vault(config: &VaultConfig) -> Arc<CredentialVault> {
	let engine = Arc::new(CpabeCliEngine::from_config(config));
	Arc::new(CredentialVault::from_config(engine, config))
}

/// Opens and migrates the database and builds every service.
pub async fn build_context(config: ServerConfig) -> anyhow::Result<AppContext> {
	let pool = warden_server_db::create_pool(&config.database.url)
		.await
		.with_context(|| format!("failed to open database {}", config.database.url))?;
	warden_server_db::run_migrations(&pool)
		.await
		.context("failed to run migrations")?;

	let vault = build_vault(&config.vault);
	let users = Arc::new(UserService::new(
		UserRepository::new(pool.clone()),
		RoleRepository::new(pool.clone()),
		GroupRepository::new(pool.clone()),
		vault.clone(),
	));
	let catalog = CatalogService::new(RoleRepository::new(pool.clone()), GroupRepository::new(pool.clone()));

	Ok(AppContext {
		config,
		pool,
		vault,
		users,
		catalog,
	})
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);
	match logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
			.init(),
		LogFormat::Pretty => registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}

/// Reads one line as a secret, dropping the line terminator.
pub fn read_secret_line(reader: &mut impl BufRead) -> anyhow::Result<SecretString> {
	let mut line = String::new();
	reader.read_line(&mut line).context("failed to read from stdin")?;
	let trimmed = line.trim_end_matches(['\r', '\n']);
	if trimmed.is_empty() {
		bail!("expected a value on stdin");
	}
	Ok(SecretString::new(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_server_auth::RoleKind;

	mod stdin {
		use super::*;

		#[test]
		fn strips_line_ending_only() {
			let mut input = " pass word1 \r\n".as_bytes();
			let secret = read_secret_line(&mut input).unwrap();
			assert_eq!(secret.expose(), " pass word1 ");
		}

		#[test]
		fn empty_input_is_an_error() {
			let mut input = "\n".as_bytes();
			assert!(read_secret_line(&mut input).is_err());
			let mut input = "".as_bytes();
			assert!(read_secret_line(&mut input).is_err());
		}
	}

	mod context {
		use super::*;

		fn config_in(dir: &std::path::Path) -> ServerConfig {
			let mut config = ServerConfig::default();
			config.database.url = format!("sqlite:{}", dir.join("warden.db").display());
			config.vault.key_dir = dir.join("keys");
			config.vault.scratch_dir = dir.join("scratch");
			config
		}

		#[tokio::test]
		async fn migrates_and_seeds() {
			let dir = tempfile::tempdir().unwrap();
			let ctx = build_context(config_in(dir.path())).await.unwrap();
			let roles = RoleRepository::new(ctx.pool.clone()).list_roles().await.unwrap();
			assert_eq!(
				roles.iter().map(|r| r.kind).collect::<Vec<_>>(),
				vec![RoleKind::User, RoleKind::Admin, RoleKind::OperatorService]
			);
			assert!(!ctx.vault.key_status().await.public_key);
		}

		#[tokio::test]
		async fn sessions_need_a_secret() {
			let dir = tempfile::tempdir().unwrap();
			let mut config = config_in(dir.path());
			let ctx = build_context(config.clone()).await.unwrap();
			assert!(ctx.sessions().is_err());

			config.token.signing_secret =
				Some(SecretString::from("0123456789abcdef0123456789abcdef"));
			let ctx = build_context(config).await.unwrap();
			assert!(ctx.sessions().is_ok());
		}
	}
}
