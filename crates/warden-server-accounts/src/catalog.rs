// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role and group catalog operations.
//!
//! Mutations are reserved for OperatorService. Builtin entries can have their
//! annotation edited but are never renamed or deleted, and nothing that is
//! still referenced can be deleted.

use tracing::{debug, info, instrument};
use warden_server_auth::gate::can_manage_catalog;
use warden_server_auth::validation::{validate_annotation, validate_name};
use warden_server_auth::{GroupId, Identity, RoleId, RoleKind};
use warden_server_db::{GroupRecord, GroupRepository, NewGroup, NewRole, RoleRecord, RoleRepository};

use crate::error::{AccountsError, AccountsResult};

#[derive(Debug, Clone)]
pub struct CreateRoleRequest {
	pub name: String,
	pub kind: RoleKind,
	pub annotation: String,
}

/// The kind of a role is fixed at creation, so it has no place here.
#[derive(Debug, Clone, Default)]
pub struct UpdateRoleRequest {
	pub name: Option<String>,
	pub annotation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateGroupRequest {
	pub name: String,
	pub annotation: String,
	pub role_ids: Vec<RoleId>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateGroupRequest {
	pub name: Option<String>,
	pub annotation: Option<String>,
	/// `Some` replaces the whole role list.
	pub role_ids: Option<Vec<RoleId>>,
}

pub struct CatalogService {
	roles: RoleRepository,
	groups: GroupRepository,
}

impl CatalogService {
	pub fn new(roles: RoleRepository, groups: GroupRepository) -> Self {
		Self { roles, groups }
	}

	// =========================================================================
	// Roles
	// =========================================================================

	#[instrument(skip(self, caller), fields(caller = %caller.name))]
	pub async fn list_roles(&self, caller: &Identity) -> AccountsResult<Vec<RoleRecord>> {
		Ok(self.roles.list_roles().await?)
	}

	#[instrument(skip(self, caller), fields(caller = %caller.name, role_id = %id))]
	pub async fn get_role(&self, caller: &Identity, id: RoleId) -> AccountsResult<RoleRecord> {
		self.find_role(id).await
	}

	#[instrument(skip(self, caller, request), fields(caller = %caller.name, name = %request.name))]
	pub async fn create_role(
		&self,
		caller: &Identity,
		request: CreateRoleRequest,
	) -> AccountsResult<RoleRecord> {
		validate_name(&request.name)?;
		validate_annotation(&request.annotation)?;
		can_manage_catalog(caller).into_result()?;

		let role = self
			.roles
			.create_role(&NewRole {
				name: request.name,
				kind: request.kind,
				annotation: request.annotation,
			})
			.await?;
		info!(role_id = %role.id, name = %role.name, kind = %role.kind, "role created");
		Ok(role)
	}

	#[instrument(skip(self, caller, request), fields(caller = %caller.name, role_id = %id))]
	pub async fn update_role(
		&self,
		caller: &Identity,
		id: RoleId,
		request: UpdateRoleRequest,
	) -> AccountsResult<RoleRecord> {
		if let Some(name) = &request.name {
			validate_name(name)?;
		}
		if let Some(annotation) = &request.annotation {
			validate_annotation(annotation)?;
		}
		can_manage_catalog(caller).into_result()?;

		let current = self.find_role(id).await?;
		if current.builtin && request.name.as_ref().is_some_and(|n| *n != current.name) {
			return Err(AccountsError::Conflict(format!(
				"builtin role {} cannot be renamed",
				current.name
			)));
		}

		if !self
			.roles
			.update_role(id, request.name.as_deref(), request.annotation.as_deref())
			.await?
		{
			return Err(AccountsError::NotFound(format!("role {id}")));
		}
		debug!(role_id = %id, "role updated");
		self.find_role(id).await
	}

	#[instrument(skip(self, caller), fields(caller = %caller.name, role_id = %id))]
	pub async fn delete_role(&self, caller: &Identity, id: RoleId) -> AccountsResult<()> {
		can_manage_catalog(caller).into_result()?;

		let role = self.find_role(id).await?;
		if role.builtin {
			return Err(AccountsError::Conflict(format!(
				"builtin role {} cannot be deleted",
				role.name
			)));
		}
		let refs = self.roles.count_references(id).await?;
		if refs.is_referenced() {
			return Err(AccountsError::Conflict(format!(
				"role {} is held by {} user(s) and {} group(s)",
				role.name, refs.users, refs.groups
			)));
		}

		if !self.roles.delete_role(id).await? {
			return Err(AccountsError::NotFound(format!("role {id}")));
		}
		info!(role_id = %id, name = %role.name, "role deleted");
		Ok(())
	}

	async fn find_role(&self, id: RoleId) -> AccountsResult<RoleRecord> {
		self.roles
			.get_role(id)
			.await?
			.ok_or_else(|| AccountsError::NotFound(format!("role {id}")))
	}

	// =========================================================================
	// Groups
	// =========================================================================

	#[instrument(skip(self, caller), fields(caller = %caller.name))]
	pub async fn list_groups(&self, caller: &Identity) -> AccountsResult<Vec<GroupRecord>> {
		Ok(self.groups.list_groups().await?)
	}

	#[instrument(skip(self, caller), fields(caller = %caller.name, group_id = %id))]
	pub async fn get_group(&self, caller: &Identity, id: GroupId) -> AccountsResult<GroupRecord> {
		self.find_group(id).await
	}

	#[instrument(skip(self, caller, request), fields(caller = %caller.name, name = %request.name))]
	pub async fn create_group(
		&self,
		caller: &Identity,
		request: CreateGroupRequest,
	) -> AccountsResult<GroupRecord> {
		validate_name(&request.name)?;
		validate_annotation(&request.annotation)?;
		can_manage_catalog(caller).into_result()?;

		self.roles.get_roles(&request.role_ids).await?;
		let group = self
			.groups
			.create_group(&NewGroup {
				name: request.name,
				annotation: request.annotation,
				role_ids: request.role_ids,
			})
			.await?;
		info!(group_id = %group.id, name = %group.name, "group created");
		Ok(group)
	}

	#[instrument(skip(self, caller, request), fields(caller = %caller.name, group_id = %id))]
	pub async fn update_group(
		&self,
		caller: &Identity,
		id: GroupId,
		request: UpdateGroupRequest,
	) -> AccountsResult<GroupRecord> {
		if let Some(name) = &request.name {
			validate_name(name)?;
		}
		if let Some(annotation) = &request.annotation {
			validate_annotation(annotation)?;
		}
		can_manage_catalog(caller).into_result()?;

		let current = self.find_group(id).await?;
		if current.builtin && request.name.as_ref().is_some_and(|n| *n != current.name) {
			return Err(AccountsError::Conflict(format!(
				"builtin group {} cannot be renamed",
				current.name
			)));
		}
		if let Some(role_ids) = &request.role_ids {
			self.roles.get_roles(role_ids).await?;
		}

		if !self
			.groups
			.update_group(
				id,
				request.name.as_deref(),
				request.annotation.as_deref(),
				request.role_ids.as_deref(),
			)
			.await?
		{
			return Err(AccountsError::NotFound(format!("group {id}")));
		}
		debug!(group_id = %id, "group updated");
		self.find_group(id).await
	}

	#[instrument(skip(self, caller), fields(caller = %caller.name, group_id = %id))]
	pub async fn delete_group(&self, caller: &Identity, id: GroupId) -> AccountsResult<()> {
		can_manage_catalog(caller).into_result()?;

		let group = self.find_group(id).await?;
		if group.builtin {
			return Err(AccountsError::Conflict(format!(
				"builtin group {} cannot be deleted",
				group.name
			)));
		}
		let members = self.groups.count_members(id).await?;
		if members > 0 {
			return Err(AccountsError::Conflict(format!(
				"group {} still has {members} member(s)",
				group.name
			)));
		}

		if !self.groups.delete_group(id).await? {
			return Err(AccountsError::NotFound(format!("group {id}")));
		}
		info!(group_id = %id, name = %group.name, "group deleted");
		Ok(())
	}

	async fn find_group(&self, id: GroupId) -> AccountsResult<GroupRecord> {
		self.groups
			.get_group(id)
			.await?
			.ok_or_else(|| AccountsError::NotFound(format!("group {id}")))
	}
}
