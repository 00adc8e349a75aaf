// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use warden_common_secret::SecretString;
use warden_server_auth::{GroupId, Identity, RoleId, RoleKind, SessionTokenCodec, UserId};
use warden_server_config::TokenConfig;
use warden_server_db::testing::create_test_pool;
use warden_server_db::{GroupRepository, NewGroup, NewUser, RoleRepository, UserRepository};
use warden_server_vault::testing::FakeAbeEngine;
use warden_server_vault::{CredentialVault, EngineKeys};

use crate::catalog::CatalogService;
use crate::session::SessionService;
use crate::user::{CreateUserRequest, UserService};

pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-that-is-long-enough";

/// Services over an in-memory database and the fake engine, with a root
/// operator already in place.
pub struct Fixture {
	pub users: Arc<UserService>,
	pub catalog: CatalogService,
	pub sessions: SessionService,
	pub vault: Arc<CredentialVault>,
	pub engine: Arc<FakeAbeEngine>,
	pub operator: Identity,
	user_repo: UserRepository,
	group_repo: GroupRepository,
	_dir: TempDir,
}

impl Fixture {
	pub async fn new() -> Self {
		Self::with_engine_timeout(Duration::from_secs(5)).await
	}

	pub async fn with_engine_timeout(timeout: Duration) -> Self {
		let pool = create_test_pool().await;
		let dir = tempfile::tempdir().unwrap();
		let engine = Arc::new(FakeAbeEngine::new());
		let vault = Arc::new(CredentialVault::new(
			engine.clone(),
			EngineKeys::in_dir(&dir.path().join("keys")),
			dir.path().join("scratch"),
			timeout,
		));
		vault.setup(false).await.unwrap();

		let user_repo = UserRepository::new(pool.clone());
		let role_repo = RoleRepository::new(pool.clone());
		let group_repo = GroupRepository::new(pool.clone());

		let users = Arc::new(UserService::new(
			user_repo.clone(),
			role_repo.clone(),
			group_repo.clone(),
			vault.clone(),
		));
		let catalog = CatalogService::new(role_repo, group_repo.clone());
		let codec = SessionTokenCodec::new(&SecretString::from(TEST_SIGNING_SECRET)).unwrap();
		let sessions = SessionService::new(users.clone(), codec, &TokenConfig::default());

		let root = users
			.create_operator(CreateUserRequest {
				name: "root".to_string(),
				password: SecretString::from("rootpass1"),
				display_name: Some("Root".to_string()),
				email: None,
				phone: None,
				role_ids: vec![],
				group_id: None,
			})
			.await
			.unwrap();
		let operator = Identity {
			user_id: root.id,
			name: root.name,
			display_name: root.display_name,
			group_id: root.group_id,
			roles: vec![RoleKind::OperatorService],
		};

		Self {
			users,
			catalog,
			sessions,
			vault,
			engine,
			operator,
			user_repo,
			group_repo,
			_dir: dir,
		}
	}

	/// Inserts a user holding the builtin role for `kind`, sealed properly,
	/// and returns the identity their token would carry.
	pub async fn seed_user(
		&self,
		name: &str,
		password: &str,
		kind: RoleKind,
		group_id: GroupId,
	) -> Identity {
		let sealed = self
			.vault
			.seal(&SecretString::from(password), kind)
			.await
			.unwrap();
		self.insert(name, sealed.into_inner(), kind, group_id).await
	}

	/// Inserts a `user`-role account whose password is still plaintext.
	pub async fn seed_legacy_user(&self, name: &str, password: &str) -> Identity {
		self.insert(
			name,
			password.to_string(),
			RoleKind::User,
			warden_server_auth::DEFAULT_GROUP_ID,
		)
		.await
	}

	async fn insert(&self, name: &str, stored: String, kind: RoleKind, group_id: GroupId) -> Identity {
		let user = NewUser {
			id: UserId::generate(),
			name: name.to_string(),
			password: stored,
			display_name: name.to_string(),
			email: None,
			phone: None,
			group_id,
			role_ids: vec![kind.builtin_role_id()],
		};
		self.user_repo.create_user(&user).await.unwrap();
		Identity {
			user_id: user.id,
			name: user.name,
			display_name: user.display_name,
			group_id,
			roles: vec![kind],
		}
	}

	pub async fn make_group(&self, name: &str) -> GroupId {
		self.group_repo
			.create_group(&NewGroup {
				name: name.to_string(),
				annotation: String::new(),
				role_ids: vec![RoleId::new(1)],
			})
			.await
			.unwrap()
			.id
	}

	pub async fn stored_password(&self, name: &str) -> String {
		self.user_repo
			.get_user_by_name(name)
			.await
			.unwrap()
			.unwrap()
			.password
	}

	pub async fn overwrite_password(&self, name: &str, stored: &str) {
		let user = self.user_repo.get_user_by_name(name).await.unwrap().unwrap();
		self.user_repo.update_password(user.id, stored).await.unwrap();
	}
}
