// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The credential vault: seal and unseal passwords under role policies.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, instrument, warn};
use warden_common_secret::SecretString;
use warden_server_auth::validation::is_password_shaped;
use warden_server_auth::RoleKind;
use warden_server_config::VaultConfig;

use crate::engine::{AbeEngine, EngineKeys};
use crate::error::{VaultError, VaultResult};
use crate::policy::{KeyAttributes, Policy};
use crate::scratch::Scratch;

/// Base64 text of an ABE ciphertext, the only form a password is stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedCredential(String);

impl SealedCredential {
	pub fn from_stored(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}

impl fmt::Display for SealedCredential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// What a stored password column currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
	Sealed,
	/// A value from before sealing was introduced, awaiting migration.
	LegacyPlaintext,
}

/// Presence of the key artifacts, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStatus {
	pub public_key: bool,
	pub master_key: bool,
}

pub struct CredentialVault {
	engine: Arc<dyn AbeEngine>,
	keys: EngineKeys,
	scratch_root: PathBuf,
	timeout: Duration,
}

impl fmt::Debug for CredentialVault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CredentialVault")
			.field("engine", &self.engine.name())
			.field("keys", &self.keys)
			.field("scratch_root", &self.scratch_root)
			.field("timeout", &self.timeout)
			.finish()
	}
}

impl CredentialVault {
	pub fn new(
		engine: Arc<dyn AbeEngine>,
		keys: EngineKeys,
		scratch_root: impl Into<PathBuf>,
		timeout: Duration,
	) -> Self {
		Self {
			engine,
			keys,
			scratch_root: scratch_root.into(),
			timeout,
		}
	}

	pub fn from_config(engine: Arc<dyn AbeEngine>, config: &VaultConfig) -> Self {
		Self::new(
			engine,
			EngineKeys::in_dir(&config.key_dir),
			config.scratch_dir.clone(),
			config.engine_timeout(),
		)
	}

	pub fn keys(&self) -> &EngineKeys {
		&self.keys
	}

	pub async fn key_status(&self) -> KeyStatus {
		KeyStatus {
			public_key: is_file(&self.keys.public_key).await,
			master_key: is_file(&self.keys.master_key).await,
		}
	}

	/// Generates the key pair. Existing keys are kept unless `force` is set,
	/// since replacing them makes every sealed credential unreadable.
	#[instrument(skip(self), fields(engine = self.engine.name()))]
	pub async fn setup(&self, force: bool) -> VaultResult<()> {
		let status = self.key_status().await;
		if (status.public_key || status.master_key) && !force {
			return Err(VaultError::KeysExist);
		}
		if let Some(dir) = self.keys.public_key.parent() {
			tokio::fs::create_dir_all(dir).await?;
		}
		if let Some(dir) = self.keys.master_key.parent() {
			tokio::fs::create_dir_all(dir).await?;
		}

		self.bounded("setup", self.engine.setup(&self.keys)).await?;
		self.require_public_key().await?;
		self.require_master_key().await?;

		info!(
			public_key = %self.keys.public_key.display(),
			replaced = status.public_key,
			"engine keys generated"
		);
		Ok(())
	}

	/// Seals `plaintext` so that only `role` and the kinds dominating it can
	/// recover it.
	#[instrument(skip(self, plaintext), fields(role = %role))]
	pub async fn seal(&self, plaintext: &SecretString, role: RoleKind) -> VaultResult<SealedCredential> {
		self.require_public_key().await?;
		let policy = Policy::for_role(role);

		let scratch = Scratch::create(&self.scratch_root, "seal").await?;
		let sealed = self.seal_in(&scratch, plaintext, &policy).await;
		scratch.finish().await;

		let sealed = sealed?;
		debug!(len = sealed.0.len(), "credential sealed");
		Ok(sealed)
	}

	async fn seal_in(
		&self,
		scratch: &Scratch,
		plaintext: &SecretString,
		policy: &Policy,
	) -> VaultResult<SealedCredential> {
		let input = scratch.file("plain");
		let output = scratch.file("plain.cpabe");
		tokio::fs::write(&input, plaintext.expose().as_bytes()).await?;

		self.bounded(
			"encrypt",
			self.engine
				.encrypt(&self.keys.public_key, &input, policy, &output),
		)
		.await?;

		let ciphertext = tokio::fs::read(&output).await?;
		if ciphertext.is_empty() {
			return Err(VaultError::CommandFailed {
				bin: self.engine.name().to_string(),
				stderr: "encrypt produced no ciphertext".to_string(),
			});
		}
		Ok(SealedCredential(STANDARD.encode(ciphertext)))
	}

	/// Recovers a plaintext with a key generated for `role`.
	///
	/// [`VaultError::NoPermission`] means `role` does not dominate the role
	/// the credential was sealed for.
	#[instrument(skip(self, sealed), fields(role = %role))]
	pub async fn unseal(&self, sealed: &SealedCredential, role: RoleKind) -> VaultResult<SecretString> {
		let ciphertext = STANDARD
			.decode(sealed.as_str())
			.map_err(|e| VaultError::MalformedCiphertext(format!("base64 decode failed: {e}")))?;
		if ciphertext.is_empty() {
			return Err(VaultError::MalformedCiphertext("empty ciphertext".to_string()));
		}
		self.require_public_key().await?;
		self.require_master_key().await?;

		let scratch = Scratch::create(&self.scratch_root, "unseal").await?;
		let plaintext = self.unseal_in(&scratch, &ciphertext, role).await;
		scratch.finish().await;

		if matches!(plaintext, Err(VaultError::NoPermission)) {
			debug!("key attributes do not satisfy the ciphertext policy");
		}
		plaintext
	}

	async fn unseal_in(
		&self,
		scratch: &Scratch,
		ciphertext: &[u8],
		role: RoleKind,
	) -> VaultResult<SecretString> {
		let private_key = scratch.file("priv_key");
		let input = scratch.file("sealed.cpabe");
		let output = scratch.file("plain");

		self.bounded(
			"keygen",
			self.engine
				.keygen(&self.keys, &KeyAttributes::for_role(role), &private_key),
		)
		.await?;

		tokio::fs::write(&input, ciphertext).await?;
		self.bounded(
			"decrypt",
			self.engine
				.decrypt(&self.keys.public_key, &private_key, &input, &output),
		)
		.await?;

		let plaintext = match tokio::fs::read(&output).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(VaultError::NoPermission),
			Err(e) => return Err(e.into()),
		};
		if plaintext.is_empty() {
			return Err(VaultError::NoPermission);
		}
		String::from_utf8(plaintext)
			.map(SecretString::new)
			.map_err(|_| VaultError::MalformedCiphertext("plaintext is not utf-8".to_string()))
	}

	/// Tells sealed values apart from legacy plaintext passwords.
	pub fn classify(stored: &str) -> CredentialState {
		if is_password_shaped(stored) {
			return CredentialState::LegacyPlaintext;
		}
		match STANDARD.decode(stored) {
			Ok(bytes) if !bytes.is_empty() => CredentialState::Sealed,
			_ => CredentialState::LegacyPlaintext,
		}
	}

	async fn require_public_key(&self) -> VaultResult<()> {
		if is_file(&self.keys.public_key).await {
			Ok(())
		} else {
			warn!(path = %self.keys.public_key.display(), "public key artifact missing");
			Err(VaultError::MissingPublicKey)
		}
	}

	async fn require_master_key(&self) -> VaultResult<()> {
		if is_file(&self.keys.master_key).await {
			Ok(())
		} else {
			warn!(path = %self.keys.master_key.display(), "master key artifact missing");
			Err(VaultError::MissingMasterKey)
		}
	}

	async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> VaultResult<T>
	where
		F: Future<Output = VaultResult<T>>,
	{
		match tokio::time::timeout(self.timeout, fut).await {
			Ok(result) => result,
			Err(_) => {
				warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "engine call timed out");
				Err(VaultError::EngineTimeout {
					operation,
					timeout_ms: self.timeout.as_millis() as u64,
				})
			}
		}
	}
}

async fn is_file(path: &Path) -> bool {
	tokio::fs::metadata(path)
		.await
		.map(|meta| meta.is_file())
		.unwrap_or(false)
}
