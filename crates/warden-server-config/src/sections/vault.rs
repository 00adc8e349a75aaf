// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential vault configuration: where the ABE key artifacts live, where
//! per-operation scratch directories are created, and which cpabe binaries
//! to run.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_KEY_DIR: &str = "/var/lib/warden/abe";
const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 30;

/// Vault configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct VaultConfig {
	/// Directory holding `pub_key` and `master_key`.
	pub key_dir: PathBuf,
	/// Root under which each seal/unseal creates its own private directory.
	pub scratch_dir: PathBuf,
	pub engine_timeout_secs: u64,
	pub setup_bin: String,
	pub encrypt_bin: String,
	pub keygen_bin: String,
	pub decrypt_bin: String,
}

impl VaultConfig {
	pub fn public_key_path(&self) -> PathBuf {
		self.key_dir.join("pub_key")
	}

	pub fn master_key_path(&self) -> PathBuf {
		self.key_dir.join("master_key")
	}

	pub fn engine_timeout(&self) -> Duration {
		Duration::from_secs(self.engine_timeout_secs)
	}
}

impl Default for VaultConfig {
	fn default() -> Self {
		VaultConfigLayer::default().finalize()
	}
}

/// Vault configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultConfigLayer {
	#[serde(default)]
	pub key_dir: Option<PathBuf>,
	#[serde(default)]
	pub scratch_dir: Option<PathBuf>,
	#[serde(default)]
	pub engine_timeout_secs: Option<u64>,
	#[serde(default)]
	pub setup_bin: Option<String>,
	#[serde(default)]
	pub encrypt_bin: Option<String>,
	#[serde(default)]
	pub keygen_bin: Option<String>,
	#[serde(default)]
	pub decrypt_bin: Option<String>,
}

impl VaultConfigLayer {
	pub fn merge(&mut self, other: VaultConfigLayer) {
		if other.key_dir.is_some() {
			self.key_dir = other.key_dir;
		}
		if other.scratch_dir.is_some() {
			self.scratch_dir = other.scratch_dir;
		}
		if other.engine_timeout_secs.is_some() {
			self.engine_timeout_secs = other.engine_timeout_secs;
		}
		if other.setup_bin.is_some() {
			self.setup_bin = other.setup_bin;
		}
		if other.encrypt_bin.is_some() {
			self.encrypt_bin = other.encrypt_bin;
		}
		if other.keygen_bin.is_some() {
			self.keygen_bin = other.keygen_bin;
		}
		if other.decrypt_bin.is_some() {
			self.decrypt_bin = other.decrypt_bin;
		}
	}

	pub fn finalize(self) -> VaultConfig {
		let key_dir = self
			.key_dir
			.unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_DIR));
		let scratch_dir = self.scratch_dir.unwrap_or_else(|| key_dir.join("scratch"));

		VaultConfig {
			key_dir,
			scratch_dir,
			engine_timeout_secs: self
				.engine_timeout_secs
				.unwrap_or(DEFAULT_ENGINE_TIMEOUT_SECS),
			setup_bin: self.setup_bin.unwrap_or_else(|| "cpabe-setup".to_string()),
			encrypt_bin: self.encrypt_bin.unwrap_or_else(|| "cpabe-enc".to_string()),
			keygen_bin: self.keygen_bin.unwrap_or_else(|| "cpabe-keygen".to_string()),
			decrypt_bin: self.decrypt_bin.unwrap_or_else(|| "cpabe-dec".to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = VaultConfigLayer::default().finalize();
		assert_eq!(config.key_dir, PathBuf::from("/var/lib/warden/abe"));
		assert_eq!(config.scratch_dir, PathBuf::from("/var/lib/warden/abe/scratch"));
		assert_eq!(config.engine_timeout(), Duration::from_secs(30));
		assert_eq!(config.encrypt_bin, "cpabe-enc");
		assert_eq!(config.public_key_path(), PathBuf::from("/var/lib/warden/abe/pub_key"));
		assert_eq!(
			config.master_key_path(),
			PathBuf::from("/var/lib/warden/abe/master_key")
		);
	}

	#[test]
	fn scratch_follows_key_dir_unless_set() {
		let config = VaultConfigLayer {
			key_dir: Some(PathBuf::from("/srv/keys")),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.scratch_dir, PathBuf::from("/srv/keys/scratch"));

		let config = VaultConfigLayer {
			key_dir: Some(PathBuf::from("/srv/keys")),
			scratch_dir: Some(PathBuf::from("/run/warden")),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.scratch_dir, PathBuf::from("/run/warden"));
	}

	#[test]
	fn merge_overrides_only_set_fields() {
		let mut base = VaultConfigLayer {
			engine_timeout_secs: Some(10),
			decrypt_bin: Some("/opt/cpabe/bin/cpabe-dec".to_string()),
			..Default::default()
		};
		base.merge(VaultConfigLayer {
			engine_timeout_secs: Some(5),
			..Default::default()
		});
		let config = base.finalize();
		assert_eq!(config.engine_timeout_secs, 5);
		assert_eq!(config.decrypt_bin, "/opt/cpabe/bin/cpabe-dec");
	}

	#[test]
	fn deserialize_partial_toml() {
		let layer: VaultConfigLayer = toml::from_str(
			r#"
key_dir = "/etc/warden/abe"
engine_timeout_secs = 12
"#,
		)
		.unwrap();
		assert_eq!(layer.key_dir, Some(PathBuf::from("/etc/warden/abe")));
		assert_eq!(layer.engine_timeout_secs, Some(12));
		assert!(layer.setup_bin.is_none());
	}
}
