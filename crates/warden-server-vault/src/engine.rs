// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::VaultResult;
use crate::policy::{KeyAttributes, Policy};

/// Locations of the long-lived key artifacts produced by setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineKeys {
	pub public_key: PathBuf,
	pub master_key: PathBuf,
}

impl EngineKeys {
	/// `pub_key` and `master_key` inside `dir`.
	pub fn in_dir(dir: &Path) -> Self {
		Self {
			public_key: dir.join("pub_key"),
			master_key: dir.join("master_key"),
		}
	}
}

/// The attribute-based cryptosystem, treated as a capability.
///
/// All inputs and outputs are files so the engine can be an external tool.
/// Implementations must not pick their own output paths; the vault hands
/// every call a path inside a directory private to that call.
#[async_trait]
pub trait AbeEngine: Send + Sync {
	fn name(&self) -> &'static str;

	/// Generates a fresh public/master key pair at `keys`.
	async fn setup(&self, keys: &EngineKeys) -> VaultResult<()>;

	/// Encrypts `input` under `policy` into `output`.
	async fn encrypt(
		&self,
		public_key: &Path,
		input: &Path,
		policy: &Policy,
		output: &Path,
	) -> VaultResult<()>;

	/// Writes a private key for `attributes` to `output`.
	async fn keygen(
		&self,
		keys: &EngineKeys,
		attributes: &KeyAttributes,
		output: &Path,
	) -> VaultResult<()>;

	/// Decrypts `input` with `private_key` into `output`.
	///
	/// Fails with [`crate::VaultError::NoPermission`] when the key's
	/// attributes do not satisfy the ciphertext policy.
	async fn decrypt(
		&self,
		public_key: &Path,
		private_key: &Path,
		input: &Path,
		output: &Path,
	) -> VaultResult<()>;
}
