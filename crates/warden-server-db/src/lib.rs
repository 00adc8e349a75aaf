// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database layer for the warden server.
//!
//! Repositories for the role catalog, the group catalog and users, plus
//! pool creation and the embedded migrations that seed the builtin roles
//! and groups.

pub mod error;
pub mod group;
pub mod pool;
pub mod role;
pub mod types;
pub mod user;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DbError, Result};
pub use group::GroupRepository;
pub use pool::{create_pool, run_migrations};
pub use role::RoleRepository;
pub use types::{GroupRecord, NewGroup, NewRole, NewUser, RoleRecord, RoleReferences, UserRecord};
pub use user::UserRepository;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn migrations_are_idempotent() {
		let pool = create_test_pool().await;
		run_migrations(&pool).await.unwrap();
		let roles = RoleRepository::new(pool.clone()).list_roles().await.unwrap();
		assert_eq!(roles.len(), 3);
		let groups = GroupRepository::new(pool).list_groups().await.unwrap();
		assert_eq!(groups.len(), 2);
	}

	#[tokio::test]
	async fn file_pool_is_created_and_migrated() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("warden.db").display());

		let pool = create_pool(&url).await.unwrap();
		run_migrations(&pool).await.unwrap();
		assert_eq!(RoleRepository::new(pool.clone()).list_roles().await.unwrap().len(), 3);
		pool.close().await;
	}

	#[tokio::test]
	async fn unknown_url_parameter_is_internal() {
		let err = create_pool("sqlite::memory:?flavour=strawberry").await.unwrap_err();
		assert!(matches!(err, DbError::Internal(_)));
	}
}
