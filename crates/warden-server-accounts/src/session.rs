// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Login and token resolution.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, instrument};
use warden_common_secret::SecretString;
use warden_server_auth::{Identity, Session, SessionTokenCodec};
use warden_server_config::TokenConfig;

use crate::error::{AccountsError, AccountsResult};
use crate::user::UserService;

/// A freshly signed token and the session it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
	pub token: String,
	pub session: Session,
}

pub struct SessionService {
	users: Arc<UserService>,
	codec: SessionTokenCodec,
	default_ttl_minutes: u64,
	max_ttl_minutes: u64,
}

impl SessionService {
	pub fn new(users: Arc<UserService>, codec: SessionTokenCodec, config: &TokenConfig) -> Self {
		Self {
			users,
			codec,
			default_ttl_minutes: config.default_ttl_minutes,
			max_ttl_minutes: config.max_ttl_minutes,
		}
	}

	/// Lifetime actually granted for a requested one, in minutes.
	pub fn effective_ttl_minutes(&self, requested: Option<u64>) -> u64 {
		requested
			.unwrap_or(self.default_ttl_minutes)
			.clamp(1, self.max_ttl_minutes.max(1))
	}

	#[instrument(skip(self, password))]
	pub async fn login(
		&self,
		name: &str,
		password: &SecretString,
		ttl_minutes: Option<u64>,
	) -> AccountsResult<IssuedToken> {
		let identity = self.users.authenticate(name, password).await?;

		let ttl = self.effective_ttl_minutes(ttl_minutes);
		let issued_at = Utc::now();
		let expires_at = i64::try_from(ttl)
			.ok()
			.and_then(Duration::try_minutes)
			.and_then(|lifetime| issued_at.checked_add_signed(lifetime))
			.ok_or_else(|| {
				AccountsError::InvalidInput(format!("token lifetime of {ttl} minutes is out of range"))
			})?;
		let token = self.codec.encode(&identity, issued_at, expires_at)?;

		info!(user_id = %identity.user_id, ttl_minutes = ttl, "session issued");
		let session = self.codec.decode_session(&token)?;
		Ok(IssuedToken { token, session })
	}

	/// Verifies a token and returns the caller it names.
	pub fn resolve(&self, token: &str) -> AccountsResult<Identity> {
		Ok(self.codec.decode(token)?)
	}

	pub fn resolve_session(&self, token: &str) -> AccountsResult<Session> {
		Ok(self.codec.decode_session(token)?)
	}
}
