// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for role checks, field validation and session tokens.

use thiserror::Error;

/// Result type alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Request Errors
	// =========================================================================
	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	/// A role name or id outside the fixed role table.
	#[error("unknown role: {0}")]
	UnknownRole(String),

	// =========================================================================
	// Token Errors
	// =========================================================================
	#[error("session token expired")]
	TokenExpired,

	#[error("malformed session token: {0}")]
	TokenMalformed(String),

	#[error("session token signature invalid")]
	TokenSignatureInvalid,

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	#[error("configuration error: {0}")]
	Configuration(String),
}

impl AuthError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(self, AuthError::Configuration(_))
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::InvalidInput(_) | AuthError::UnknownRole(_) => 400,
			AuthError::TokenExpired
			| AuthError::TokenMalformed(_)
			| AuthError::TokenSignatureInvalid => 401,
			AuthError::PermissionDenied(_) => 403,
			AuthError::Configuration(_) => 500,
		}
	}
}
