// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission decisions for user, role and group mutations.
//!
//! Every predicate is a pure function of the caller's [`Identity`] and the
//! target's current (update, delete, read) or proposed (create) facts. A deny
//! always carries a reason. Callers turn a [`Decision`] into a
//! [`AuthError::PermissionDenied`] with [`Decision::into_result`] before
//! touching storage.
//!
//! Rules, with `>=` meaning [`RoleKind::at_least`]:
//!
//! | Operation | Allowed when |
//! |-----------|--------------|
//! | create/update/delete role or group | caller is OperatorService |
//! | create user | caller >= Admin |
//! | read/update self | always |
//! | read/update/delete other user | OperatorService, or Admin in the target's group and >= target |
//! | assign roles/group | every assigned kind <= caller; non-operators keep their own group |

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::types::{
	highest_of, GroupId, RoleId, RoleKind, UserId, DEFAULT_GROUP_ID, OPERATOR_GROUP_ID,
};

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
	Allow,
	Deny(String),
}

impl Decision {
	fn deny(reason: impl Into<String>) -> Self {
		Decision::Deny(reason.into())
	}

	pub fn is_allowed(&self) -> bool {
		matches!(self, Decision::Allow)
	}

	pub fn into_result(self) -> AuthResult<()> {
		match self {
			Decision::Allow => Ok(()),
			Decision::Deny(reason) => Err(AuthError::PermissionDenied(reason)),
		}
	}
}

/// Current facts about a user targeted by a read, update or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUser {
	pub user_id: UserId,
	pub group_id: GroupId,
	pub roles: Vec<RoleKind>,
}

impl TargetUser {
	pub fn highest_role(&self) -> RoleKind {
		highest_of(self.roles.iter().copied())
	}
}

/// A catalog role together with the privilege level it grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
	pub id: RoleId,
	pub kind: RoleKind,
}

impl RoleGrant {
	pub fn builtin(kind: RoleKind) -> Self {
		Self {
			id: kind.builtin_role_id(),
			kind,
		}
	}
}

/// Roles and group a user ends up with after defaulting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
	pub roles: Vec<RoleGrant>,
	pub group_id: GroupId,
}

impl Assignment {
	pub fn kinds(&self) -> Vec<RoleKind> {
		self.roles.iter().map(|r| r.kind).collect()
	}

	pub fn highest_role(&self) -> RoleKind {
		highest_of(self.roles.iter().map(|r| r.kind))
	}
}

// =============================================================================
// Catalog
// =============================================================================

/// Roles and groups are managed by OperatorService only.
#[instrument(level = "debug", skip(caller), fields(caller = %caller.name))]
pub fn can_manage_catalog(caller: &Identity) -> Decision {
	if caller.is_operator() {
		Decision::Allow
	} else {
		log_deny(
			caller,
			Decision::deny("only op_service may create, update or delete roles and groups"),
		)
	}
}

// =============================================================================
// Users
// =============================================================================

#[instrument(level = "debug", skip(caller), fields(caller = %caller.name))]
pub fn can_create_user(caller: &Identity) -> Decision {
	if caller.highest_role().at_least(RoleKind::Admin) {
		Decision::Allow
	} else {
		log_deny(caller, Decision::deny("creating users requires admin or above"))
	}
}

#[instrument(level = "debug", skip(caller, target), fields(caller = %caller.name, target = %target.user_id))]
pub fn can_read_user(caller: &Identity, target: &TargetUser) -> Decision {
	if caller.is_self(target.user_id) {
		return Decision::Allow;
	}
	log_deny(caller, can_manage_other(caller, target, "read"))
}

#[instrument(level = "debug", skip(caller, target), fields(caller = %caller.name, target = %target.user_id))]
pub fn can_update_user(caller: &Identity, target: &TargetUser) -> Decision {
	if caller.is_self(target.user_id) {
		return Decision::Allow;
	}
	log_deny(caller, can_manage_other(caller, target, "update"))
}

/// Deleting follows the other-user rule even for the caller's own record.
#[instrument(level = "debug", skip(caller, target), fields(caller = %caller.name, target = %target.user_id))]
pub fn can_delete_user(caller: &Identity, target: &TargetUser) -> Decision {
	log_deny(caller, can_manage_other(caller, target, "delete"))
}

fn can_manage_other(caller: &Identity, target: &TargetUser, action: &str) -> Decision {
	let caller_role = caller.highest_role();
	if caller_role == RoleKind::OperatorService {
		return Decision::Allow;
	}
	if caller_role != RoleKind::Admin {
		return Decision::deny(format!("{action} of another user requires admin or above"));
	}
	if !caller.in_group(target.group_id) {
		return Decision::deny(format!(
			"admin may only {action} users in group {}",
			caller.group_id
		));
	}
	if !caller_role.at_least(target.highest_role()) {
		return Decision::deny(format!(
			"cannot {action} a user holding {}",
			target.highest_role()
		));
	}
	Decision::Allow
}

// =============================================================================
// Role and group assignment
// =============================================================================

/// Checks a proposed assignment against the caller's own privilege.
#[instrument(level = "debug", skip(caller, assignment), fields(caller = %caller.name, group = %assignment.group_id))]
pub fn can_assign(caller: &Identity, assignment: &Assignment) -> Decision {
	let caller_role = caller.highest_role();
	let assigned = assignment.highest_role();
	if !caller_role.at_least(assigned) {
		return log_deny(
			caller,
			Decision::deny(format!("{caller_role} cannot grant {assigned}")),
		);
	}
	if caller_role != RoleKind::OperatorService && !caller.in_group(assignment.group_id) {
		return log_deny(
			caller,
			Decision::deny(format!(
				"only op_service may place users outside group {}",
				caller.group_id
			)),
		);
	}
	Decision::Allow
}

/// Fills in defaults for a new user.
///
/// No roles means the builtin `user` role. No group means the default group
/// for an operator, else the caller's own group. Granting OperatorService
/// always lands the user in the reserved operator group.
pub fn resolve_create_assignment(
	caller: &Identity,
	roles: Vec<RoleGrant>,
	group_id: Option<GroupId>,
) -> Assignment {
	let roles = if roles.is_empty() {
		vec![RoleGrant::builtin(RoleKind::User)]
	} else {
		roles
	};
	let group_id = group_id.unwrap_or(if caller.is_operator() {
		DEFAULT_GROUP_ID
	} else {
		caller.group_id
	});
	force_operator_group(Assignment { roles, group_id })
}

/// Applies an update's role/group patch to the current assignment.
///
/// An empty role list keeps the current roles and `None` keeps the group.
pub fn resolve_update_assignment(
	current: &Assignment,
	roles: Vec<RoleGrant>,
	group_id: Option<GroupId>,
) -> Assignment {
	let roles = if roles.is_empty() {
		current.roles.clone()
	} else {
		roles
	};
	let group_id = group_id.unwrap_or(current.group_id);
	force_operator_group(Assignment { roles, group_id })
}

fn force_operator_group(mut assignment: Assignment) -> Assignment {
	if assignment.highest_role() == RoleKind::OperatorService
		&& assignment.group_id != OPERATOR_GROUP_ID
	{
		debug!(
			from = %assignment.group_id,
			"op_service granted, moving user into the operator group"
		);
		assignment.group_id = OPERATOR_GROUP_ID;
	}
	assignment
}

fn log_deny(caller: &Identity, decision: Decision) -> Decision {
	if let Decision::Deny(reason) = &decision {
		warn!(caller = %caller.name, role = %caller.highest_role(), %reason, "permission denied");
	}
	decision
}
