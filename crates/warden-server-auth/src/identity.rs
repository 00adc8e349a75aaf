// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The authenticated caller of a request.

use serde::{Deserialize, Serialize};

use crate::types::{highest_of, GroupId, RoleKind, UserId};

/// Facts about the caller, decoded from the session token once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	pub user_id: UserId,
	pub name: String,
	pub display_name: String,
	pub group_id: GroupId,
	pub roles: Vec<RoleKind>,
}

impl Identity {
	pub fn highest_role(&self) -> RoleKind {
		highest_of(self.roles.iter().copied())
	}

	pub fn is_operator(&self) -> bool {
		self.highest_role() == RoleKind::OperatorService
	}

	pub fn is_self(&self, user_id: UserId) -> bool {
		self.user_id == user_id
	}

	pub fn in_group(&self, group_id: GroupId) -> bool {
		self.group_id == group_id
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::DEFAULT_GROUP_ID;

	fn identity(roles: Vec<RoleKind>) -> Identity {
		Identity {
			user_id: UserId::generate(),
			name: "alice".to_string(),
			display_name: "Alice".to_string(),
			group_id: DEFAULT_GROUP_ID,
			roles,
		}
	}

	#[test]
	fn no_roles_means_lowest() {
		let id = identity(vec![]);
		assert_eq!(id.highest_role(), RoleKind::User);
		assert!(!id.is_operator());
	}

	#[test]
	fn operator_detected_among_many() {
		let id = identity(vec![RoleKind::User, RoleKind::OperatorService]);
		assert!(id.is_operator());
	}

	#[test]
	fn serializes_roles_by_name() {
		let json = serde_json::to_value(identity(vec![RoleKind::Admin])).unwrap();
		assert_eq!(json["roles"], serde_json::json!(["admin"]));
		assert_eq!(json["group_id"], serde_json::json!(1));
	}
}
