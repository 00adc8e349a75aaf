// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Group catalog repository.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use warden_server_auth::{GroupId, RoleId};

use crate::error::{DbError, Result};
use crate::types::{parse_timestamp, GroupRecord, NewGroup};

const GROUP_COLUMNS: &str = "id, name, annotation, builtin, created_at, updated_at";

/// Repository for the group catalog and group-role links.
#[derive(Clone)]
pub struct GroupRepository {
	pool: SqlitePool,
}

impl GroupRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a non-builtin group and its role links in one transaction.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the name is taken or a role id is unknown.
	#[tracing::instrument(skip(self, group), fields(name = %group.name))]
	pub async fn create_group(&self, group: &NewGroup) -> Result<GroupRecord> {
		let now = Utc::now().to_rfc3339();
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			INSERT INTO groups (name, annotation, builtin, created_at, updated_at)
			VALUES (?, ?, 0, ?, ?)
			"#,
		)
		.bind(&group.name)
		.bind(&group.annotation)
		.bind(&now)
		.bind(&now)
		.execute(&mut *tx)
		.await
		.map_err(|e| DbError::from_write(e, &format!("group {}", group.name)))?;

		let id = GroupId::new(result.last_insert_rowid());
		replace_roles(&mut tx, id, &group.role_ids).await?;
		let record = fetch_group(&mut tx, id)
			.await?
			.ok_or_else(|| DbError::Internal(format!("group {id} vanished after insert")))?;
		tx.commit().await?;

		tracing::debug!(group_id = %id, name = %group.name, "group created");
		Ok(record)
	}

	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn get_group(&self, id: GroupId) -> Result<Option<GroupRecord>> {
		let mut conn = self.pool.acquire().await?;
		fetch_group(&mut conn, id).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_group_by_name(&self, name: &str) -> Result<Option<GroupRecord>> {
		let mut conn = self.pool.acquire().await?;
		let row = sqlx::query(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE name = ?"))
			.bind(name)
			.fetch_optional(&mut *conn)
			.await?;
		match row {
			Some(row) => Ok(Some(group_from_row(&mut conn, &row).await?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_groups(&self) -> Result<Vec<GroupRecord>> {
		let mut conn = self.pool.acquire().await?;
		let rows = sqlx::query(&format!("SELECT {GROUP_COLUMNS} FROM groups ORDER BY id"))
			.fetch_all(&mut *conn)
			.await?;
		let mut groups = Vec::with_capacity(rows.len());
		for row in &rows {
			groups.push(group_from_row(&mut conn, row).await?);
		}
		Ok(groups)
	}

	/// Patch name, annotation and, when given, the full role list.
	///
	/// Returns `false` if no such group exists.
	#[tracing::instrument(skip(self, annotation, role_ids), fields(group_id = %id))]
	pub async fn update_group(
		&self,
		id: GroupId,
		name: Option<&str>,
		annotation: Option<&str>,
		role_ids: Option<&[RoleId]>,
	) -> Result<bool> {
		let now = Utc::now().to_rfc3339();
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			UPDATE groups
			SET name = COALESCE(?, name),
			    annotation = COALESCE(?, annotation),
			    updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(name)
		.bind(annotation)
		.bind(&now)
		.bind(id.get())
		.execute(&mut *tx)
		.await
		.map_err(|e| DbError::from_write(e, &format!("group {}", name.unwrap_or_default())))?;

		if result.rows_affected() == 0 {
			return Ok(false);
		}
		if let Some(role_ids) = role_ids {
			replace_roles(&mut tx, id, role_ids).await?;
		}
		tx.commit().await?;

		tracing::debug!(group_id = %id, "group updated");
		Ok(true)
	}

	/// Returns `false` if no such group exists.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if users still belong to the group.
	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn delete_group(&self, id: GroupId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM groups WHERE id = ?")
			.bind(id.get())
			.execute(&self.pool)
			.await
			.map_err(|e| DbError::from_write(e, &format!("group {id}")))?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::debug!(group_id = %id, "group deleted");
		}
		Ok(deleted)
	}

	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn count_members(&self, id: GroupId) -> Result<i64> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE group_id = ?")
			.bind(id.get())
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}
}

async fn replace_roles(conn: &mut SqliteConnection, id: GroupId, role_ids: &[RoleId]) -> Result<()> {
	sqlx::query("DELETE FROM group_roles WHERE group_id = ?")
		.bind(id.get())
		.execute(&mut *conn)
		.await?;
	for role_id in role_ids {
		sqlx::query("INSERT OR IGNORE INTO group_roles (group_id, role_id) VALUES (?, ?)")
			.bind(id.get())
			.bind(role_id.get())
			.execute(&mut *conn)
			.await
			.map_err(|e| DbError::from_write(e, &format!("role {role_id}")))?;
	}
	Ok(())
}

async fn fetch_group(conn: &mut SqliteConnection, id: GroupId) -> Result<Option<GroupRecord>> {
	let row = sqlx::query(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?"))
		.bind(id.get())
		.fetch_optional(&mut *conn)
		.await?;
	match row {
		Some(row) => Ok(Some(group_from_row(conn, &row).await?)),
		None => Ok(None),
	}
}

async fn group_from_row(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<GroupRecord> {
	let id = GroupId::new(row.get("id"));
	let role_ids: Vec<i64> =
		sqlx::query_scalar("SELECT role_id FROM group_roles WHERE group_id = ? ORDER BY role_id")
			.bind(id.get())
			.fetch_all(&mut *conn)
			.await?;
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	Ok(GroupRecord {
		id,
		name: row.get("name"),
		annotation: row.get("annotation"),
		builtin: row.get::<i64, _>("builtin") != 0,
		role_ids: role_ids.into_iter().map(RoleId::new).collect(),
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use warden_server_auth::{DEFAULT_GROUP_ID, OPERATOR_GROUP_ID};

	async fn make_repo() -> GroupRepository {
		GroupRepository::new(create_test_pool().await)
	}

	fn new_group(name: &str, role_ids: &[i64]) -> NewGroup {
		NewGroup {
			name: name.to_string(),
			annotation: String::new(),
			role_ids: role_ids.iter().copied().map(RoleId::new).collect(),
		}
	}

	#[tokio::test]
	async fn builtins_are_seeded() {
		let repo = make_repo().await;
		let groups = repo.list_groups().await.unwrap();
		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].id, DEFAULT_GROUP_ID);
		assert_eq!(groups[0].role_ids, vec![RoleId::new(1)]);
		assert_eq!(groups[1].id, OPERATOR_GROUP_ID);
		assert!(groups.iter().all(|g| g.builtin));
	}

	#[tokio::test]
	async fn create_with_roles() {
		let repo = make_repo().await;
		let created = repo.create_group(&new_group("ops", &[1, 888])).await.unwrap();
		assert_eq!(created.role_ids, vec![RoleId::new(1), RoleId::new(888)]);
		assert!(!created.builtin);

		let fetched = repo.get_group_by_name("ops").await.unwrap().unwrap();
		assert_eq!(fetched, created);
	}

	#[tokio::test]
	async fn unknown_role_rolls_back_create() {
		let repo = make_repo().await;
		let err = repo.create_group(&new_group("ghosts", &[4242])).await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
		assert!(repo.get_group_by_name("ghosts").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn duplicate_name_conflicts() {
		let repo = make_repo().await;
		let err = repo.create_group(&new_group("default", &[])).await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn update_replaces_roles_only_when_given() {
		let repo = make_repo().await;
		let created = repo.create_group(&new_group("eng", &[1])).await.unwrap();

		repo.update_group(created.id, None, Some("engineering"), None)
			.await
			.unwrap();
		let fetched = repo.get_group(created.id).await.unwrap().unwrap();
		assert_eq!(fetched.annotation, "engineering");
		assert_eq!(fetched.role_ids, vec![RoleId::new(1)]);

		repo.update_group(created.id, None, None, Some(&[RoleId::new(888)]))
			.await
			.unwrap();
		let fetched = repo.get_group(created.id).await.unwrap().unwrap();
		assert_eq!(fetched.role_ids, vec![RoleId::new(888)]);
	}

	#[tokio::test]
	async fn delete_empty_group() {
		let repo = make_repo().await;
		let created = repo.create_group(&new_group("temp", &[1])).await.unwrap();
		assert_eq!(repo.count_members(created.id).await.unwrap(), 0);
		assert!(repo.delete_group(created.id).await.unwrap());
		assert!(repo.get_group(created.id).await.unwrap().is_none());
		assert!(!repo.delete_group(created.id).await.unwrap());
	}
}
