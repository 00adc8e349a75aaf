// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User operations.
//!
//! Every mutation follows the same order: field validation, permission gate,
//! role/group defaulting, assignment gate, then sealing and persistence. The
//! first two steps never touch storage or the engine, so a rejected request
//! leaves nothing behind.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use warden_common_secret::SecretString;
use warden_server_auth::gate::{
	can_assign, can_create_user, can_delete_user, can_read_user, can_update_user,
	resolve_create_assignment, resolve_update_assignment,
};
use warden_server_auth::validation::is_password_shaped;
use warden_server_auth::{
	Assignment, GroupId, Identity, RoleGrant, RoleId, RoleKind, TargetUser, UserFields, UserId,
	OPERATOR_GROUP_ID,
};
use warden_server_db::{GroupRepository, NewUser, RoleRepository, UserRecord, UserRepository};
use warden_server_vault::{CredentialState, CredentialVault, SealedCredential, VaultError};

use crate::error::{AccountsError, AccountsResult};

// =============================================================================
// Requests and views
// =============================================================================

#[derive(Debug, Clone)]
pub struct CreateUserRequest {
	pub name: String,
	pub password: SecretString,
	/// Defaults to `name`.
	pub display_name: Option<String>,
	pub email: Option<String>,
	pub phone: Option<String>,
	/// Empty means the builtin `user` role.
	pub role_ids: Vec<RoleId>,
	pub group_id: Option<GroupId>,
}

/// Patch for an existing user. Only supplied fields change; an empty
/// `role_ids` keeps the current roles.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserRequest {
	pub name: String,
	pub new_name: Option<String>,
	pub password: Option<SecretString>,
	pub display_name: Option<String>,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub role_ids: Vec<RoleId>,
	pub group_id: Option<GroupId>,
}

/// A user as returned to callers. Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
	pub id: UserId,
	pub name: String,
	pub display_name: String,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub group_id: GroupId,
	pub roles: Vec<RoleGrant>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserProfile {
	fn from(r: UserRecord) -> Self {
		Self {
			id: r.id,
			name: r.name,
			display_name: r.display_name,
			email: r.email,
			phone: r.phone,
			group_id: r.group_id,
			roles: r.roles,
			created_at: r.created_at,
			updated_at: r.updated_at,
		}
	}
}

impl UserProfile {
	pub fn highest_role(&self) -> RoleKind {
		warden_server_auth::highest_of(self.roles.iter().map(|r| r.kind))
	}
}

/// Outcome of sweeping every user for legacy plaintext passwords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SealReport {
	pub sealed: usize,
	pub already_sealed: usize,
	/// Users whose stored value could not be sealed, with the reason.
	pub failed: Vec<(String, String)>,
}

// =============================================================================
// Service
// =============================================================================

pub struct UserService {
	users: UserRepository,
	roles: RoleRepository,
	groups: GroupRepository,
	vault: Arc<CredentialVault>,
}

impl UserService {
	pub fn new(
		users: UserRepository,
		roles: RoleRepository,
		groups: GroupRepository,
		vault: Arc<CredentialVault>,
	) -> Self {
		Self {
			users,
			roles,
			groups,
			vault,
		}
	}

	#[instrument(skip(self, caller, request), fields(caller = %caller.name, name = %request.name))]
	pub async fn create_user(
		&self,
		caller: &Identity,
		request: CreateUserRequest,
	) -> AccountsResult<UserProfile> {
		UserFields {
			name: Some(&request.name),
			password: Some(&request.password),
			display_name: request.display_name.as_deref(),
			email: request.email.as_deref(),
			phone: request.phone.as_deref(),
		}
		.validate()?;

		can_create_user(caller).into_result()?;

		let grants = self.resolve_grants(&request.role_ids).await?;
		let assignment = resolve_create_assignment(caller, grants, request.group_id);
		self.require_group(assignment.group_id).await?;
		can_assign(caller, &assignment).into_result()?;

		self.insert(request, assignment).await
	}

	/// Creates an OperatorService user without a calling identity. Used to
	/// bootstrap a fresh installation from the admin binary.
	#[instrument(skip(self, request), fields(name = %request.name))]
	pub async fn create_operator(&self, request: CreateUserRequest) -> AccountsResult<UserProfile> {
		UserFields {
			name: Some(&request.name),
			password: Some(&request.password),
			display_name: request.display_name.as_deref(),
			email: request.email.as_deref(),
			phone: request.phone.as_deref(),
		}
		.validate()?;

		let assignment = Assignment {
			roles: vec![RoleGrant::builtin(RoleKind::OperatorService)],
			group_id: OPERATOR_GROUP_ID,
		};
		self.insert(request, assignment).await
	}

	async fn insert(
		&self,
		request: CreateUserRequest,
		assignment: Assignment,
	) -> AccountsResult<UserProfile> {
		let sealed = self
			.vault
			.seal(&request.password, assignment.highest_role())
			.await
			.map_err(|e| vault_failure("seal", e))?;

		let user = NewUser {
			id: UserId::generate(),
			display_name: request
				.display_name
				.unwrap_or_else(|| request.name.clone()),
			name: request.name,
			password: sealed.into_inner(),
			email: request.email,
			phone: request.phone,
			group_id: assignment.group_id,
			role_ids: assignment.roles.iter().map(|r| r.id).collect(),
		};
		self.users.create_user(&user).await?;

		info!(
			user_id = %user.id,
			name = %user.name,
			group = %user.group_id,
			role = %assignment.highest_role(),
			"user created"
		);
		self.profile_by_id(user.id).await
	}

	/// Applies a patch. The new stored credential is computed before any
	/// write, so an engine failure leaves the user untouched; profile, roles
	/// and password are then written in one short transaction.
	#[instrument(skip(self, caller, request), fields(caller = %caller.name, name = %request.name))]
	pub async fn update_user(
		&self,
		caller: &Identity,
		request: UpdateUserRequest,
	) -> AccountsResult<UserProfile> {
		UserFields {
			name: request.new_name.as_deref(),
			password: request.password.as_ref(),
			display_name: request.display_name.as_deref(),
			email: request.email.as_deref(),
			phone: request.phone.as_deref(),
		}
		.validate()?;

		let current = self.find(&request.name).await?;
		can_update_user(caller, &target_of(&current)).into_result()?;

		let current_assignment = Assignment {
			roles: current.roles.clone(),
			group_id: current.group_id,
		};
		let grants = self.resolve_grants(&request.role_ids).await?;
		let assignment = resolve_update_assignment(&current_assignment, grants, request.group_id);
		if assignment != current_assignment {
			self.require_group(assignment.group_id).await?;
			can_assign(caller, &assignment).into_result()?;
		}

		let old_role = current_assignment.highest_role();
		let new_role = assignment.highest_role();

		let mut updated = current.clone();
		if let Some(new_name) = request.new_name {
			updated.name = new_name;
		}
		if let Some(display_name) = request.display_name {
			updated.display_name = display_name;
		}
		if request.email.is_some() {
			updated.email = request.email;
		}
		if request.phone.is_some() {
			updated.phone = request.phone;
		}
		updated.roles = assignment.roles;
		updated.group_id = assignment.group_id;

		let stored = match &request.password {
			Some(password) => Some(
				self.vault
					.seal(password, new_role)
					.await
					.map_err(|e| vault_failure("seal", e))?,
			),
			None if new_role != old_role => self.reseal(&current, new_role).await?,
			None => None,
		};

		let mut tx = self.users.begin().await?;
		if !self.users.update_user_in_tx(&mut tx, &updated).await? {
			return Err(AccountsError::NotFound(format!("user {}", request.name)));
		}
		if let Some(stored) = &stored {
			self.users
				.update_password_in_tx(&mut tx, current.id, stored.as_str())
				.await?;
		}
		tx.commit().await.map_err(warden_server_db::DbError::from)?;

		info!(
			user_id = %current.id,
			password_changed = request.password.is_some(),
			resealed = stored.is_some() && request.password.is_none(),
			role = %new_role,
			"user updated"
		);
		self.profile_by_id(current.id).await
	}

	/// Re-encrypts an existing credential for a new highest role. Legacy
	/// plaintext is left for the seal migration.
	async fn reseal(
		&self,
		user: &UserRecord,
		role: RoleKind,
	) -> AccountsResult<Option<SealedCredential>> {
		if CredentialVault::classify(&user.password) == CredentialState::LegacyPlaintext {
			debug!(user_id = %user.id, "legacy plaintext password, skipping reseal");
			return Ok(None);
		}
		let plaintext = self
			.vault
			.unseal(
				&SealedCredential::from_stored(user.password.as_str()),
				RoleKind::OperatorService,
			)
			.await
			.map_err(|e| vault_failure("unseal", e))?;
		let sealed = self
			.vault
			.seal(&plaintext, role)
			.await
			.map_err(|e| vault_failure("seal", e))?;
		Ok(Some(sealed))
	}

	#[instrument(skip(self, caller), fields(caller = %caller.name))]
	pub async fn delete_user(&self, caller: &Identity, name: &str) -> AccountsResult<()> {
		let target = self.find(name).await?;
		can_delete_user(caller, &target_of(&target)).into_result()?;

		if !self.users.delete_user(target.id).await? {
			return Err(AccountsError::NotFound(format!("user {name}")));
		}
		info!(user_id = %target.id, name, "user deleted");
		Ok(())
	}

	#[instrument(skip(self, caller), fields(caller = %caller.name))]
	pub async fn get_user(&self, caller: &Identity, name: &str) -> AccountsResult<UserProfile> {
		let target = self.find(name).await?;
		can_read_user(caller, &target_of(&target)).into_result()?;
		Ok(target.into())
	}

	/// OperatorService sees everyone, an Admin sees the users of their group
	/// they outrank or equal, anyone else sees only themselves.
	#[instrument(skip(self, caller), fields(caller = %caller.name))]
	pub async fn list_manageable_users(&self, caller: &Identity) -> AccountsResult<Vec<UserProfile>> {
		let candidates = match caller.highest_role() {
			RoleKind::OperatorService => self.users.list_users().await?,
			RoleKind::Admin => self.users.list_users_in_group(caller.group_id).await?,
			RoleKind::User => self
				.users
				.get_user(caller.user_id)
				.await?
				.into_iter()
				.collect(),
		};
		Ok(candidates
			.into_iter()
			.filter(|u| can_read_user(caller, &target_of(u)).is_allowed())
			.map(UserProfile::from)
			.collect())
	}

	/// Recovers a user's password with the caller's own highest role.
	///
	/// The read gate decides who may ask; the credential policy decides who
	/// can actually open it. A caller below the owner's role gets
	/// [`AccountsError::NoPermission`].
	#[instrument(skip(self, caller), fields(caller = %caller.name))]
	pub async fn reveal_password(&self, caller: &Identity, name: &str) -> AccountsResult<SecretString> {
		let target = self.find(name).await?;
		can_read_user(caller, &target_of(&target)).into_result()?;

		if CredentialVault::classify(&target.password) == CredentialState::LegacyPlaintext {
			return Err(AccountsError::Conflict(format!(
				"password of {name} has not been sealed yet"
			)));
		}
		self.vault
			.unseal(
				&SealedCredential::from_stored(target.password.as_str()),
				caller.highest_role(),
			)
			.await
			.map_err(|e| vault_failure("unseal", e))
	}

	/// Checks a name and password, returning the identity to put in a token.
	///
	/// Unknown users, wrong passwords and credentials the operator key cannot
	/// open all fail with [`AccountsError::InvalidCredentials`]. Engine
	/// outages are reported as such.
	#[instrument(skip(self, password))]
	pub async fn authenticate(&self, name: &str, password: &SecretString) -> AccountsResult<Identity> {
		let Some(user) = self.users.get_user_by_name(name).await? else {
			debug!("unknown user");
			return Err(AccountsError::InvalidCredentials);
		};

		let matched = match CredentialVault::classify(&user.password) {
			CredentialState::LegacyPlaintext => {
				warn!(user_id = %user.id, "legacy plaintext password in use, run seal-user");
				password.matches(&SecretString::new(user.password.clone()))
			}
			CredentialState::Sealed => {
				let stored = SealedCredential::from_stored(user.password.as_str());
				match self.vault.unseal(&stored, RoleKind::OperatorService).await {
					Ok(plaintext) => plaintext.matches(password),
					Err(VaultError::NoPermission) => {
						warn!(user_id = %user.id, "stored credential refused the operator key");
						false
					}
					Err(e) => return Err(vault_failure("unseal", e)),
				}
			}
		};

		if !matched {
			debug!(user_id = %user.id, "password mismatch");
			return Err(AccountsError::InvalidCredentials);
		}

		Ok(Identity {
			user_id: user.id,
			display_name: user.display_name.clone(),
			group_id: user.group_id,
			roles: user.role_kinds(),
			name: user.name,
		})
	}

	/// One-time migration of a legacy plaintext password to sealed form.
	///
	/// # Errors
	/// `Conflict` if the value is already sealed, `InvalidInput` if the
	/// legacy value is not a valid password.
	#[instrument(skip(self))]
	pub async fn seal_legacy_password(&self, name: &str) -> AccountsResult<()> {
		let user = self.find(name).await?;
		self.seal_record(&user).await
	}

	async fn seal_record(&self, user: &UserRecord) -> AccountsResult<()> {
		if CredentialVault::classify(&user.password) == CredentialState::Sealed {
			return Err(AccountsError::Conflict(format!(
				"password of {} is already sealed",
				user.name
			)));
		}
		if !is_password_shaped(&user.password) {
			return Err(AccountsError::InvalidInput(format!(
				"stored password of {} is not a valid password",
				user.name
			)));
		}

		let role = warden_server_auth::highest_of(user.role_kinds());
		let sealed = self
			.vault
			.seal(&SecretString::new(user.password.clone()), role)
			.await
			.map_err(|e| vault_failure("seal", e))?;
		if !self.users.update_password(user.id, sealed.as_str()).await? {
			return Err(AccountsError::NotFound(format!("user {}", user.name)));
		}

		info!(user_id = %user.id, %role, "legacy password sealed");
		Ok(())
	}

	/// Seals every legacy password. Per-user failures are collected; an
	/// unavailable engine stops the sweep.
	#[instrument(skip(self))]
	pub async fn seal_all_legacy(&self) -> AccountsResult<SealReport> {
		let mut report = SealReport::default();
		for user in self.users.list_users().await? {
			match self.seal_record(&user).await {
				Ok(()) => report.sealed += 1,
				Err(AccountsError::Conflict(_)) => report.already_sealed += 1,
				Err(e @ AccountsError::EngineUnavailable(_)) => return Err(e),
				Err(e) => {
					warn!(user_id = %user.id, error = %e, "could not seal legacy password");
					report.failed.push((user.name, e.to_string()));
				}
			}
		}
		info!(
			sealed = report.sealed,
			already_sealed = report.already_sealed,
			failed = report.failed.len(),
			"legacy password sweep finished"
		);
		Ok(report)
	}

	async fn find(&self, name: &str) -> AccountsResult<UserRecord> {
		self.users
			.get_user_by_name(name)
			.await?
			.ok_or_else(|| AccountsError::NotFound(format!("user {name}")))
	}

	async fn profile_by_id(&self, id: UserId) -> AccountsResult<UserProfile> {
		self.users
			.get_user(id)
			.await?
			.map(UserProfile::from)
			.ok_or_else(|| AccountsError::Internal(format!("user {id} vanished after write")))
	}

	async fn resolve_grants(&self, role_ids: &[RoleId]) -> AccountsResult<Vec<RoleGrant>> {
		let roles = self.roles.get_roles(role_ids).await?;
		Ok(roles.iter().map(|r| r.grant()).collect())
	}

	async fn require_group(&self, id: GroupId) -> AccountsResult<()> {
		match self.groups.get_group(id).await? {
			Some(_) => Ok(()),
			None => Err(AccountsError::NotFound(format!("group {id}"))),
		}
	}
}

fn target_of(user: &UserRecord) -> TargetUser {
	TargetUser {
		user_id: user.id,
		group_id: user.group_id,
		roles: user.role_kinds(),
	}
}

fn vault_failure(operation: &'static str, e: VaultError) -> AccountsError {
	if e.is_internal() {
		error!(operation, error = %e, "credential engine failure");
	} else {
		warn!(operation, error = %e, "credential operation refused");
	}
	e.into()
}
