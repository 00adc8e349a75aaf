// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy strings and key attributes derived from a [`RoleKind`].
//!
//! Each kind has a numeric attribute value. A ciphertext sealed for a kind is
//! readable by that kind and by every kind that dominates it:
//!
//! | Kind | Policy | Key attributes |
//! |------|--------|----------------|
//! | op_service | `(op_service = 1)` | `op_service`, `op_service = 1` |
//! | admin | `op_service or (admin = 2)` | `admin`, `admin = 2` |
//! | user | `op_service or admin or (user = 3)` | `user = 3` |

use std::fmt;

use warden_server_auth::RoleKind;

use crate::error::{VaultError, VaultResult};

fn attribute_value(kind: RoleKind) -> u8 {
	match kind {
		RoleKind::OperatorService => 1,
		RoleKind::Admin => 2,
		RoleKind::User => 3,
	}
}

/// Parses a role name, failing with [`VaultError::InvalidRole`].
pub fn parse_role(name: &str) -> VaultResult<RoleKind> {
	name.parse()
		.map_err(|_| VaultError::InvalidRole(name.to_string()))
}

/// Boolean attribute expression a ciphertext is sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy(String);

impl Policy {
	pub fn for_role(kind: RoleKind) -> Self {
		let value = attribute_value(kind);
		let expr = match kind {
			RoleKind::OperatorService => format!("(op_service = {value})"),
			RoleKind::Admin => format!("op_service or (admin = {value})"),
			RoleKind::User => format!("op_service or admin or (user = {value})"),
		};
		Self(expr)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The kind this policy was built for, if it is one of ours.
	pub fn sealed_for(&self) -> Option<RoleKind> {
		RoleKind::all()
			.iter()
			.copied()
			.find(|kind| Policy::for_role(*kind) == *self)
	}
}

impl fmt::Display for Policy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Policy {
	fn from(expr: &str) -> Self {
		Self(expr.to_string())
	}
}

/// Attribute set a private key is generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttributes(Vec<String>);

impl KeyAttributes {
	pub fn for_role(kind: RoleKind) -> Self {
		let value = attribute_value(kind);
		let attrs = match kind {
			RoleKind::OperatorService => vec!["op_service".to_string(), format!("op_service = {value}")],
			RoleKind::Admin => vec!["admin".to_string(), format!("admin = {value}")],
			RoleKind::User => vec![format!("user = {value}")],
		};
		Self(attrs)
	}

	pub fn as_slice(&self) -> &[String] {
		&self.0
	}

	/// The kind these attributes were built for, if it is one of ours.
	pub fn granted_to(&self) -> Option<RoleKind> {
		RoleKind::all()
			.iter()
			.copied()
			.find(|kind| KeyAttributes::for_role(*kind) == *self)
	}
}

impl From<Vec<String>> for KeyAttributes {
	fn from(attrs: Vec<String>) -> Self {
		Self(attrs)
	}
}

/// Whether a key for `key_kind` satisfies the policy for `sealed_kind`.
pub fn satisfies(key_kind: RoleKind, sealed_kind: RoleKind) -> bool {
	key_kind.at_least(sealed_kind)
}
