// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process [`AbeEngine`] for tests.
//!
//! Ciphertexts carry their policy in clear text ahead of the payload and
//! private keys are just the role name, so this offers no secrecy at all. It
//! does enforce the same satisfaction rule as the real engine: a key opens a
//! ciphertext only if its role dominates the role the policy was built for.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use warden_server_auth::RoleKind;

use crate::engine::{AbeEngine, EngineKeys};
use crate::error::{VaultError, VaultResult};
use crate::policy::{satisfies, KeyAttributes, Policy};

const MAGIC: &[u8] = b"FAKEABE1\n";

#[derive(Debug, Default)]
pub struct FakeAbeEngine {
	hanging: AtomicBool,
	key_paths: Mutex<Vec<PathBuf>>,
}

impl FakeAbeEngine {
	pub fn new() -> Self {
		Self::default()
	}

	/// While set, encrypt, keygen and decrypt never complete.
	pub fn set_hanging(&self, hanging: bool) {
		self.hanging.store(hanging, Ordering::SeqCst);
	}

	/// Every path a private key was written to, in call order.
	pub fn key_paths(&self) -> Vec<PathBuf> {
		self.key_paths
			.lock()
			.map(|paths| paths.clone())
			.unwrap_or_default()
	}

	async fn maybe_hang(&self) {
		if self.hanging.load(Ordering::SeqCst) {
			std::future::pending::<()>().await;
		}
	}
}

fn failed(message: impl Into<String>) -> VaultError {
	VaultError::CommandFailed {
		bin: "fake-abe".to_string(),
		stderr: message.into(),
	}
}

#[async_trait]
impl AbeEngine for FakeAbeEngine {
	fn name(&self) -> &'static str {
		"fake-abe"
	}

	async fn setup(&self, keys: &EngineKeys) -> VaultResult<()> {
		tokio::fs::write(&keys.public_key, b"fake public parameters").await?;
		tokio::fs::write(&keys.master_key, b"fake master secret").await?;
		Ok(())
	}

	async fn encrypt(
		&self,
		public_key: &Path,
		input: &Path,
		policy: &Policy,
		output: &Path,
	) -> VaultResult<()> {
		self.maybe_hang().await;
		if tokio::fs::metadata(public_key).await.is_err() {
			return Err(failed("public key unreadable"));
		}
		let plaintext = tokio::fs::read(input).await?;
		let mut ciphertext = MAGIC.to_vec();
		ciphertext.extend_from_slice(policy.as_str().as_bytes());
		ciphertext.push(b'\n');
		ciphertext.extend_from_slice(&plaintext);
		tokio::fs::write(output, ciphertext).await?;
		Ok(())
	}

	async fn keygen(
		&self,
		keys: &EngineKeys,
		attributes: &KeyAttributes,
		output: &Path,
	) -> VaultResult<()> {
		self.maybe_hang().await;
		if tokio::fs::metadata(&keys.master_key).await.is_err() {
			return Err(failed("master key unreadable"));
		}
		let kind = attributes
			.granted_to()
			.ok_or_else(|| failed("unrecognised attribute set"))?;
		tokio::fs::write(output, kind.as_str()).await?;
		if let Ok(mut paths) = self.key_paths.lock() {
			paths.push(output.to_path_buf());
		}
		Ok(())
	}

	async fn decrypt(
		&self,
		_public_key: &Path,
		private_key: &Path,
		input: &Path,
		output: &Path,
	) -> VaultResult<()> {
		self.maybe_hang().await;
		let key = tokio::fs::read_to_string(private_key).await?;
		let key_kind: RoleKind = key.parse().map_err(|_| failed("unreadable private key"))?;

		let ciphertext = tokio::fs::read(input).await?;
		let body = ciphertext
			.strip_prefix(MAGIC)
			.ok_or(VaultError::NoPermission)?;
		let split = body
			.iter()
			.position(|b| *b == b'\n')
			.ok_or(VaultError::NoPermission)?;
		let policy = Policy::from(&*String::from_utf8_lossy(&body[..split]));
		let sealed_kind = policy.sealed_for().ok_or(VaultError::NoPermission)?;

		if !satisfies(key_kind, sealed_kind) {
			return Err(VaultError::NoPermission);
		}
		tokio::fs::write(output, &body[split + 1..]).await?;
		Ok(())
	}
}
