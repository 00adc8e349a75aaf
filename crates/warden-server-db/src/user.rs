// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User repository.
//!
//! Multi-step writes come in `*_in_tx` form so the accounts layer can hold a
//! transaction open across a credential reseal and roll back if it fails.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use warden_server_auth::{GroupId, RoleGrant, RoleId, UserId};

use crate::error::{DbError, Result};
use crate::types::{parse_kind, parse_timestamp, parse_user_id, NewUser, UserRecord};

const USER_COLUMNS: &str =
	"id, name, password, display_name, email, phone, group_id, created_at, updated_at";

/// Repository for users and their role grants.
#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Begin a new transaction.
	pub async fn begin(&self) -> Result<sqlx::Transaction<'_, sqlx::Sqlite>> {
		Ok(self.pool.begin().await?)
	}

	/// Insert a user and their role grants.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the name is taken or a role or group
	/// id is unknown.
	#[tracing::instrument(skip(self, user), fields(user_id = %user.id, name = %user.name))]
	pub async fn create_user(&self, user: &NewUser) -> Result<()> {
		let mut tx = self.begin().await?;
		self.create_user_in_tx(&mut tx, user).await?;
		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self, tx, user), fields(user_id = %user.id, name = %user.name))]
	pub async fn create_user_in_tx(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
		user: &NewUser,
	) -> Result<()> {
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			r#"
			INSERT INTO users (id, name, password, display_name, email, phone, group_id, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.name)
		.bind(&user.password)
		.bind(&user.display_name)
		.bind(&user.email)
		.bind(&user.phone)
		.bind(user.group_id.get())
		.bind(&now)
		.bind(&now)
		.execute(&mut **tx)
		.await
		.map_err(|e| DbError::from_write(e, &format!("user {}", user.name)))?;

		replace_roles(tx, user.id, &user.role_ids).await?;

		tracing::debug!(user_id = %user.id, name = %user.name, "user created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
		let mut conn = self.pool.acquire().await?;
		fetch_user(&mut conn, "id", &id.to_string()).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_user_by_name(&self, name: &str) -> Result<Option<UserRecord>> {
		let mut conn = self.pool.acquire().await?;
		fetch_user(&mut conn, "name", name).await
	}

	#[tracing::instrument(skip(self, tx), fields(user_id = %id))]
	pub async fn get_user_in_tx(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
		id: UserId,
	) -> Result<Option<UserRecord>> {
		fetch_user(tx, "id", &id.to_string()).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
		let mut conn = self.pool.acquire().await?;
		let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name"))
			.fetch_all(&mut *conn)
			.await?;
		users_from_rows(&mut conn, &rows).await
	}

	#[tracing::instrument(skip(self), fields(group_id = %group_id))]
	pub async fn list_users_in_group(&self, group_id: GroupId) -> Result<Vec<UserRecord>> {
		let mut conn = self.pool.acquire().await?;
		let rows = sqlx::query(&format!(
			"SELECT {USER_COLUMNS} FROM users WHERE group_id = ? ORDER BY name"
		))
		.bind(group_id.get())
		.fetch_all(&mut *conn)
		.await?;
		users_from_rows(&mut conn, &rows).await
	}

	/// Overwrite every mutable column and the role grants from `user`.
	///
	/// Returns `false` if no such user exists.
	#[tracing::instrument(skip(self, tx, user), fields(user_id = %user.id))]
	pub async fn update_user_in_tx(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
		user: &UserRecord,
	) -> Result<bool> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			UPDATE users
			SET name = ?, password = ?, display_name = ?, email = ?, phone = ?, group_id = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&user.name)
		.bind(&user.password)
		.bind(&user.display_name)
		.bind(&user.email)
		.bind(&user.phone)
		.bind(user.group_id.get())
		.bind(&now)
		.bind(user.id.to_string())
		.execute(&mut **tx)
		.await
		.map_err(|e| DbError::from_write(e, &format!("user {}", user.name)))?;

		if result.rows_affected() == 0 {
			return Ok(false);
		}
		let role_ids: Vec<RoleId> = user.roles.iter().map(|r| r.id).collect();
		replace_roles(tx, user.id, &role_ids).await?;

		tracing::debug!(user_id = %user.id, "user updated");
		Ok(true)
	}

	/// Replace only the stored password.
	#[tracing::instrument(skip(self, stored), fields(user_id = %id))]
	pub async fn update_password(&self, id: UserId, stored: &str) -> Result<bool> {
		let mut tx = self.begin().await?;
		let updated = self.update_password_in_tx(&mut tx, id, stored).await?;
		tx.commit().await?;
		Ok(updated)
	}

	#[tracing::instrument(skip(self, tx, stored), fields(user_id = %id))]
	pub async fn update_password_in_tx(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
		id: UserId,
		stored: &str,
	) -> Result<bool> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
			.bind(stored)
			.bind(&now)
			.bind(id.to_string())
			.execute(&mut **tx)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Returns `false` if no such user exists. Role grants go with the user.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn delete_user(&self, id: UserId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM users WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::debug!(user_id = %id, "user deleted");
		}
		Ok(deleted)
	}
}

async fn replace_roles(conn: &mut SqliteConnection, id: UserId, role_ids: &[RoleId]) -> Result<()> {
	sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
		.bind(id.to_string())
		.execute(&mut *conn)
		.await?;
	for role_id in role_ids {
		sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
			.bind(id.to_string())
			.bind(role_id.get())
			.execute(&mut *conn)
			.await
			.map_err(|e| DbError::from_write(e, &format!("role {role_id}")))?;
	}
	Ok(())
}

async fn fetch_user(
	conn: &mut SqliteConnection,
	column: &'static str,
	value: &str,
) -> Result<Option<UserRecord>> {
	let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?"))
		.bind(value)
		.fetch_optional(&mut *conn)
		.await?;
	match row {
		Some(row) => Ok(Some(user_from_row(conn, &row).await?)),
		None => Ok(None),
	}
}

async fn users_from_rows(conn: &mut SqliteConnection, rows: &[SqliteRow]) -> Result<Vec<UserRecord>> {
	let mut users = Vec::with_capacity(rows.len());
	for row in rows {
		users.push(user_from_row(conn, row).await?);
	}
	Ok(users)
}

async fn user_from_row(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<UserRecord> {
	let id: String = row.get("id");
	let grants = sqlx::query(
		r#"
		SELECT r.id, r.kind
		FROM user_roles ur
		JOIN roles r ON r.id = ur.role_id
		WHERE ur.user_id = ?
		ORDER BY r.id
		"#,
	)
	.bind(&id)
	.fetch_all(&mut *conn)
	.await?;

	let mut roles = Vec::with_capacity(grants.len());
	for grant in &grants {
		let kind: String = grant.get("kind");
		roles.push(RoleGrant {
			id: RoleId::new(grant.get("id")),
			kind: parse_kind(&kind)?,
		});
	}

	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	Ok(UserRecord {
		id: parse_user_id(&id)?,
		name: row.get("name"),
		password: row.get("password"),
		display_name: row.get("display_name"),
		email: row.get("email"),
		phone: row.get("phone"),
		group_id: GroupId::new(row.get("group_id")),
		roles,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}
