// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the credential vault.

use thiserror::Error;

/// Result type alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
	// =========================================================================
	// Key Artifact Errors
	// =========================================================================
	#[error("public key artifact does not exist")]
	MissingPublicKey,

	#[error("master key artifact does not exist")]
	MissingMasterKey,

	#[error("key artifacts already exist, refusing to overwrite")]
	KeysExist,

	// =========================================================================
	// Protocol Errors
	// =========================================================================
	#[error("role is invalid: {0}")]
	InvalidRole(String),

	#[error("malformed ciphertext: {0}")]
	MalformedCiphertext(String),

	/// The key's attributes do not satisfy the ciphertext policy.
	#[error("the role permission denied")]
	NoPermission,

	// =========================================================================
	// Engine Transport Errors
	// =========================================================================
	#[error("engine {operation} timed out after {timeout_ms} ms")]
	EngineTimeout {
		operation: &'static str,
		timeout_ms: u64,
	},

	#[error("engine binary not found: {bin}")]
	EngineNotInstalled { bin: String },

	#[error("engine command failed: {bin}: {stderr}")]
	CommandFailed { bin: String, stderr: String },

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

impl VaultError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			VaultError::MissingPublicKey
				| VaultError::MissingMasterKey
				| VaultError::EngineTimeout { .. }
				| VaultError::EngineNotInstalled { .. }
				| VaultError::CommandFailed { .. }
				| VaultError::MalformedCiphertext(_)
				| VaultError::Io(_)
		)
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			VaultError::InvalidRole(_) => 400,
			VaultError::NoPermission => 403,
			VaultError::KeysExist => 409,
			VaultError::MissingPublicKey
			| VaultError::MissingMasterKey
			| VaultError::EngineNotInstalled { .. } => 503,
			VaultError::EngineTimeout { .. } => 504,
			VaultError::MalformedCiphertext(_)
			| VaultError::CommandFailed { .. }
			| VaultError::Io(_) => 500,
		}
	}

	/// Missing key artifacts or a missing engine binary.
	pub fn is_unavailable(&self) -> bool {
		matches!(
			self,
			VaultError::MissingPublicKey
				| VaultError::MissingMasterKey
				| VaultError::EngineNotInstalled { .. }
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_permission_is_not_internal() {
		assert!(!VaultError::NoPermission.is_internal());
		assert_eq!(VaultError::NoPermission.status_code(), 403);
	}

	#[test]
	fn missing_keys_are_unavailable() {
		assert!(VaultError::MissingPublicKey.is_unavailable());
		assert!(VaultError::MissingMasterKey.is_unavailable());
		assert!(!VaultError::NoPermission.is_unavailable());
		assert_eq!(VaultError::MissingMasterKey.status_code(), 503);
	}
}
