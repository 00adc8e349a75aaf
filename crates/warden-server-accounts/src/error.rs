// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy at the service boundary.

use thiserror::Error;
use warden_server_auth::AuthError;
use warden_server_db::DbError;
use warden_server_vault::VaultError;

/// Result type alias for account operations.
pub type AccountsResult<T> = Result<T, AccountsError>;

#[derive(Debug, Error)]
pub enum AccountsError {
	// =========================================================================
	// Request Errors
	// =========================================================================
	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	// =========================================================================
	// Authentication Errors
	// =========================================================================
	/// Unknown user, wrong password, or a credential the operator key could
	/// not open. Callers cannot tell these apart.
	#[error("invalid credentials")]
	InvalidCredentials,

	#[error("unauthenticated: {0}")]
	Unauthenticated(String),

	// =========================================================================
	// Vault Errors
	// =========================================================================
	/// The caller's role does not satisfy the credential's policy.
	#[error("role does not permit unsealing this credential")]
	NoPermission,

	#[error("credential engine unavailable: {0}")]
	EngineUnavailable(String),

	#[error("credential engine transport failure: {0}")]
	TransportFailure(String),

	// =========================================================================
	// Internal Errors
	// =========================================================================
	#[error("internal error: {0}")]
	Internal(String),
}

impl AccountsError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			AccountsError::EngineUnavailable(_)
				| AccountsError::TransportFailure(_)
				| AccountsError::Internal(_)
		)
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			AccountsError::InvalidInput(_) => 400,
			AccountsError::InvalidCredentials | AccountsError::Unauthenticated(_) => 401,
			AccountsError::PermissionDenied(_) | AccountsError::NoPermission => 403,
			AccountsError::NotFound(_) => 404,
			AccountsError::Conflict(_) => 409,
			AccountsError::Internal(_) => 500,
			AccountsError::EngineUnavailable(_) | AccountsError::TransportFailure(_) => 503,
		}
	}
}

impl From<AuthError> for AccountsError {
	fn from(e: AuthError) -> Self {
		match e {
			AuthError::InvalidInput(msg) => AccountsError::InvalidInput(msg),
			AuthError::UnknownRole(role) => AccountsError::InvalidInput(format!("unknown role: {role}")),
			AuthError::PermissionDenied(reason) => AccountsError::PermissionDenied(reason),
			e @ (AuthError::TokenExpired
			| AuthError::TokenMalformed(_)
			| AuthError::TokenSignatureInvalid) => AccountsError::Unauthenticated(e.to_string()),
			AuthError::Configuration(msg) => AccountsError::Internal(msg),
		}
	}
}

impl From<VaultError> for AccountsError {
	fn from(e: VaultError) -> Self {
		match e {
			VaultError::NoPermission => AccountsError::NoPermission,
			VaultError::InvalidRole(role) => AccountsError::InvalidInput(format!("invalid role: {role}")),
			VaultError::KeysExist => AccountsError::Conflict(e.to_string()),
			VaultError::MalformedCiphertext(_) => AccountsError::Internal(e.to_string()),
			e @ (VaultError::MissingPublicKey
			| VaultError::MissingMasterKey
			| VaultError::EngineNotInstalled { .. }) => AccountsError::EngineUnavailable(e.to_string()),
			e @ (VaultError::EngineTimeout { .. }
			| VaultError::CommandFailed { .. }
			| VaultError::Io(_)) => AccountsError::TransportFailure(e.to_string()),
		}
	}
}

impl From<DbError> for AccountsError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::NotFound(what) => AccountsError::NotFound(what),
			DbError::Conflict(what) => AccountsError::Conflict(what),
			DbError::Sqlx(_) | DbError::Internal(_) => AccountsError::Internal(e.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	mod vault {
		use super::*;

		#[test]
		fn missing_keys_are_engine_unavailable() {
			assert!(matches!(
				AccountsError::from(VaultError::MissingPublicKey),
				AccountsError::EngineUnavailable(_)
			));
			assert!(matches!(
				AccountsError::from(VaultError::MissingMasterKey),
				AccountsError::EngineUnavailable(_)
			));
		}

		#[test]
		fn transport_failures() {
			let timeout = VaultError::EngineTimeout {
				operation: "decrypt",
				timeout_ms: 100,
			};
			assert!(matches!(
				AccountsError::from(timeout),
				AccountsError::TransportFailure(_)
			));
			let io = VaultError::Io(std::io::Error::other("disk gone"));
			assert!(matches!(AccountsError::from(io), AccountsError::TransportFailure(_)));
		}

		#[test]
		fn no_permission_is_kept_distinct() {
			let err = AccountsError::from(VaultError::NoPermission);
			assert!(matches!(err, AccountsError::NoPermission));
			assert!(!err.is_internal());
			assert_eq!(err.status_code(), 403);
		}

		#[test]
		fn malformed_ciphertext_is_internal() {
			let err = AccountsError::from(VaultError::MalformedCiphertext("bad base64".into()));
			assert!(err.is_internal());
		}
	}

	mod auth {
		use super::*;

		#[test]
		fn token_errors_are_unauthenticated() {
			for e in [
				AuthError::TokenExpired,
				AuthError::TokenSignatureInvalid,
				AuthError::TokenMalformed("x".into()),
			] {
				let err = AccountsError::from(e);
				assert!(matches!(err, AccountsError::Unauthenticated(_)));
				assert_eq!(err.status_code(), 401);
			}
		}

		#[test]
		fn unknown_role_is_invalid_input() {
			assert!(matches!(
				AccountsError::from(AuthError::UnknownRole("root".into())),
				AccountsError::InvalidInput(_)
			));
		}
	}

	#[test]
	fn db_conflict_and_not_found_survive() {
		assert_eq!(AccountsError::from(DbError::Conflict("x".into())).status_code(), 409);
		assert_eq!(AccountsError::from(DbError::NotFound("x".into())).status_code(), 404);
		assert!(AccountsError::from(DbError::Internal("x".into())).is_internal());
	}
}
