// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Row types shared by the repositories.

use std::fmt;

use chrono::{DateTime, Utc};
use warden_common_secret::REDACTED;
use warden_server_auth::{GroupId, RoleGrant, RoleId, RoleKind, UserId};

use crate::error::{DbError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
	pub id: RoleId,
	pub name: String,
	pub kind: RoleKind,
	pub annotation: String,
	pub builtin: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl RoleRecord {
	pub fn grant(&self) -> RoleGrant {
		RoleGrant {
			id: self.id,
			kind: self.kind,
		}
	}
}

#[derive(Debug, Clone)]
pub struct NewRole {
	pub name: String,
	pub kind: RoleKind,
	pub annotation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
	pub id: GroupId,
	pub name: String,
	pub annotation: String,
	pub builtin: bool,
	pub role_ids: Vec<RoleId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
	pub name: String,
	pub annotation: String,
	pub role_ids: Vec<RoleId>,
}

/// A user row with its role grants. `password` is the stored form, either a
/// sealed credential or a legacy plaintext awaiting migration, and is never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
	pub id: UserId,
	pub name: String,
	pub password: String,
	pub display_name: String,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub group_id: GroupId,
	pub roles: Vec<RoleGrant>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for UserRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UserRecord")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("password", &REDACTED)
			.field("display_name", &self.display_name)
			.field("email", &self.email)
			.field("phone", &self.phone)
			.field("group_id", &self.group_id)
			.field("roles", &self.roles)
			.field("created_at", &self.created_at)
			.field("updated_at", &self.updated_at)
			.finish()
	}
}

impl UserRecord {
	pub fn role_kinds(&self) -> Vec<RoleKind> {
		self.roles.iter().map(|r| r.kind).collect()
	}
}

/// Parameters for inserting a user. `password` must already be in stored form.
#[derive(Clone)]
pub struct NewUser {
	pub id: UserId,
	pub name: String,
	pub password: String,
	pub display_name: String,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub group_id: GroupId,
	pub role_ids: Vec<RoleId>,
}

/// How many rows point at a role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleReferences {
	pub users: i64,
	pub groups: i64,
}

impl RoleReferences {
	pub fn is_referenced(&self) -> bool {
		self.users > 0 || self.groups > 0
	}
}

impl fmt::Debug for NewUser {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NewUser")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("password", &REDACTED)
			.field("display_name", &self.display_name)
			.field("email", &self.email)
			.field("phone", &self.phone)
			.field("group_id", &self.group_id)
			.field("role_ids", &self.role_ids)
			.finish()
	}
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp {value:?}: {e}")))
}

pub(crate) fn parse_kind(value: &str) -> Result<RoleKind> {
	value
		.parse()
		.map_err(|_| DbError::Internal(format!("stored role kind {value:?} is not recognised")))
}

pub(crate) fn parse_user_id(value: &str) -> Result<UserId> {
	uuid::Uuid::parse_str(value)
		.map(UserId::new)
		.map_err(|e| DbError::Internal(format!("invalid user id {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn seeded_timestamp_format_parses() {
		assert!(parse_timestamp("2025-03-01T12:00:00Z").is_ok());
	}

	#[test]
	fn unknown_kind_is_internal() {
		assert!(matches!(parse_kind("superuser"), Err(DbError::Internal(_))));
		assert_eq!(parse_kind("op_service").unwrap(), RoleKind::OperatorService);
	}

	#[test]
	fn debug_output_hides_password() {
		let now = Utc::now();
		let record = UserRecord {
			id: UserId::generate(),
			name: "pat".to_string(),
			password: "patspass1".to_string(),
			display_name: "Pat".to_string(),
			email: None,
			phone: None,
			group_id: GroupId::new(1),
			roles: vec![],
			created_at: now,
			updated_at: now,
		};
		let printed = format!("{record:?}");
		assert!(!printed.contains("patspass1"));
		assert!(printed.contains("[REDACTED]"));
		assert!(printed.contains("pat"));

		let new_user = NewUser {
			id: record.id,
			name: record.name.clone(),
			password: record.password.clone(),
			display_name: record.display_name.clone(),
			email: None,
			phone: None,
			group_id: record.group_id,
			role_ids: vec![],
		};
		assert!(!format!("{new_user:?}").contains("patspass1"));
	}

	#[test]
	fn references() {
		assert!(!RoleReferences::default().is_referenced());
		assert!(RoleReferences { users: 0, groups: 1 }.is_referenced());
	}
}
