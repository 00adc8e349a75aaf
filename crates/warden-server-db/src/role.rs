// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role catalog repository.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use warden_server_auth::RoleId;

use crate::error::{DbError, Result};
use crate::types::{parse_kind, parse_timestamp, NewRole, RoleRecord, RoleReferences};

const ROLE_COLUMNS: &str = "id, name, kind, annotation, builtin, created_at, updated_at";

/// Repository for the role catalog.
#[derive(Clone)]
pub struct RoleRepository {
	pool: SqlitePool,
}

impl RoleRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a non-builtin role.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the name is taken.
	#[tracing::instrument(skip(self, role), fields(name = %role.name, kind = %role.kind))]
	pub async fn create_role(&self, role: &NewRole) -> Result<RoleRecord> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			INSERT INTO roles (name, kind, annotation, builtin, created_at, updated_at)
			VALUES (?, ?, ?, 0, ?, ?)
			"#,
		)
		.bind(&role.name)
		.bind(role.kind.as_str())
		.bind(&role.annotation)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_write(e, &format!("role {}", role.name)))?;

		let id = RoleId::new(result.last_insert_rowid());
		tracing::debug!(role_id = %id, name = %role.name, "role created");

		self.get_role(id)
			.await?
			.ok_or_else(|| DbError::Internal(format!("role {id} vanished after insert")))
	}

	#[tracing::instrument(skip(self), fields(role_id = %id))]
	pub async fn get_role(&self, id: RoleId) -> Result<Option<RoleRecord>> {
		let mut conn = self.pool.acquire().await?;
		fetch_role(&mut conn, id).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>> {
		let row = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?"))
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(role_from_row).transpose()
	}

	/// Look up every id, failing with `DbError::NotFound` on the first miss.
	#[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
	pub async fn get_roles(&self, ids: &[RoleId]) -> Result<Vec<RoleRecord>> {
		let mut conn = self.pool.acquire().await?;
		let mut roles = Vec::with_capacity(ids.len());
		for id in ids {
			let role = fetch_role(&mut conn, *id)
				.await?
				.ok_or_else(|| DbError::NotFound(format!("role {id}")))?;
			roles.push(role);
		}
		Ok(roles)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_roles(&self) -> Result<Vec<RoleRecord>> {
		let rows = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY id"))
			.fetch_all(&self.pool)
			.await?;
		rows.iter().map(role_from_row).collect()
	}

	/// Update name and annotation. The kind is fixed at creation.
	///
	/// Returns `false` if no such role exists.
	#[tracing::instrument(skip(self, annotation), fields(role_id = %id))]
	pub async fn update_role(
		&self,
		id: RoleId,
		name: Option<&str>,
		annotation: Option<&str>,
	) -> Result<bool> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			UPDATE roles
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
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_write(e, &format!("role {}", name.unwrap_or_default())))?;

		let updated = result.rows_affected() > 0;
		if updated {
			tracing::debug!(role_id = %id, "role updated");
		}
		Ok(updated)
	}

	/// Returns `false` if no such role exists.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if a user or group still holds the role.
	#[tracing::instrument(skip(self), fields(role_id = %id))]
	pub async fn delete_role(&self, id: RoleId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM roles WHERE id = ?")
			.bind(id.get())
			.execute(&self.pool)
			.await
			.map_err(|e| DbError::from_write(e, &format!("role {id}")))?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::debug!(role_id = %id, "role deleted");
		}
		Ok(deleted)
	}

	#[tracing::instrument(skip(self), fields(role_id = %id))]
	pub async fn count_references(&self, id: RoleId) -> Result<RoleReferences> {
		let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = ?")
			.bind(id.get())
			.fetch_one(&self.pool)
			.await?;
		let groups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_roles WHERE role_id = ?")
			.bind(id.get())
			.fetch_one(&self.pool)
			.await?;
		Ok(RoleReferences { users, groups })
	}
}

async fn fetch_role(conn: &mut SqliteConnection, id: RoleId) -> Result<Option<RoleRecord>> {
	let row = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?"))
		.bind(id.get())
		.fetch_optional(&mut *conn)
		.await?;
	row.as_ref().map(role_from_row).transpose()
}

fn role_from_row(row: &SqliteRow) -> Result<RoleRecord> {
	let kind: String = row.get("kind");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	Ok(RoleRecord {
		id: RoleId::new(row.get("id")),
		name: row.get("name"),
		kind: parse_kind(&kind)?,
		annotation: row.get("annotation"),
		builtin: row.get::<i64, _>("builtin") != 0,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}
