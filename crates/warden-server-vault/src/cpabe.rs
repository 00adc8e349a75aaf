// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! [`AbeEngine`] backed by the cpabe toolkit binaries.
//!
//! Arguments are passed directly to the binary, never through a shell, so
//! policy strings and paths need no quoting. Children are killed when their
//! future is dropped, which is what happens when the vault's timeout fires.

use std::ffi::OsString;
use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, trace, warn};
use warden_server_config::VaultConfig;

use crate::engine::{AbeEngine, EngineKeys};
use crate::error::{VaultError, VaultResult};
use crate::policy::{KeyAttributes, Policy};

#[derive(Debug, Clone)]
pub struct CpabeCliEngine {
	setup_bin: String,
	encrypt_bin: String,
	keygen_bin: String,
	decrypt_bin: String,
}

impl CpabeCliEngine {
	pub fn new(
		setup_bin: impl Into<String>,
		encrypt_bin: impl Into<String>,
		keygen_bin: impl Into<String>,
		decrypt_bin: impl Into<String>,
	) -> Self {
		Self {
			setup_bin: setup_bin.into(),
			encrypt_bin: encrypt_bin.into(),
			keygen_bin: keygen_bin.into(),
			decrypt_bin: decrypt_bin.into(),
		}
	}

	pub fn from_config(config: &VaultConfig) -> Self {
		Self::new(
			&config.setup_bin,
			&config.encrypt_bin,
			&config.keygen_bin,
			&config.decrypt_bin,
		)
	}
}

impl Default for CpabeCliEngine {
	fn default() -> Self {
		Self::from_config(&VaultConfig::default())
	}
}

#[async_trait]
impl AbeEngine for CpabeCliEngine {
	fn name(&self) -> &'static str {
		"cpabe-cli"
	}

	async fn setup(&self, keys: &EngineKeys) -> VaultResult<()> {
		run_checked(&self.setup_bin, setup_args(keys)).await?;
		info!(public_key = %keys.public_key.display(), "cpabe setup complete");
		Ok(())
	}

	async fn encrypt(
		&self,
		public_key: &Path,
		input: &Path,
		policy: &Policy,
		output: &Path,
	) -> VaultResult<()> {
		run_checked(&self.encrypt_bin, encrypt_args(public_key, input, policy, output)).await?;
		Ok(())
	}

	async fn keygen(
		&self,
		keys: &EngineKeys,
		attributes: &KeyAttributes,
		output: &Path,
	) -> VaultResult<()> {
		run_checked(&self.keygen_bin, keygen_args(keys, attributes, output)).await?;
		Ok(())
	}

	async fn decrypt(
		&self,
		public_key: &Path,
		private_key: &Path,
		input: &Path,
		output: &Path,
	) -> VaultResult<()> {
		let out = run(&self.decrypt_bin, decrypt_args(public_key, private_key, input, output)).await?;
		if out.status.success() {
			return Ok(());
		}
		// cpabe-dec exits non-zero when the key does not satisfy the policy.
		debug!(
			status = ?out.status.code(),
			stderr = %String::from_utf8_lossy(&out.stderr).trim(),
			"cpabe-dec refused, treating as unsatisfied policy"
		);
		Err(VaultError::NoPermission)
	}
}

fn setup_args(keys: &EngineKeys) -> Vec<OsString> {
	vec![
		"-p".into(),
		keys.public_key.clone().into(),
		"-m".into(),
		keys.master_key.clone().into(),
	]
}

fn encrypt_args(public_key: &Path, input: &Path, policy: &Policy, output: &Path) -> Vec<OsString> {
	vec![
		"-o".into(),
		output.into(),
		public_key.into(),
		input.into(),
		policy.as_str().into(),
	]
}

fn keygen_args(keys: &EngineKeys, attributes: &KeyAttributes, output: &Path) -> Vec<OsString> {
	let mut args: Vec<OsString> = vec![
		"-o".into(),
		output.into(),
		keys.public_key.clone().into(),
		keys.master_key.clone().into(),
	];
	args.extend(attributes.as_slice().iter().map(OsString::from));
	args
}

fn decrypt_args(public_key: &Path, private_key: &Path, input: &Path, output: &Path) -> Vec<OsString> {
	vec![
		"-o".into(),
		output.into(),
		public_key.into(),
		private_key.into(),
		input.into(),
	]
}

async fn run(bin: &str, args: Vec<OsString>) -> VaultResult<Output> {
	let mut cmd = Command::new(bin);
	cmd.args(&args).kill_on_drop(true);

	trace!(bin, argc = args.len(), "running cpabe command");

	cmd.output().await.map_err(|e| {
		if e.kind() == std::io::ErrorKind::NotFound {
			warn!(bin, "cpabe binary not found in PATH");
			VaultError::EngineNotInstalled {
				bin: bin.to_string(),
			}
		} else {
			VaultError::Io(e)
		}
	})
}

async fn run_checked(bin: &str, args: Vec<OsString>) -> VaultResult<Output> {
	let output = run(bin, args).await?;
	if output.status.success() {
		Ok(output)
	} else {
		Err(VaultError::CommandFailed {
			bin: bin.to_string(),
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		})
	}
}
