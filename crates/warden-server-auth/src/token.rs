// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session token codec.
//!
//! Tokens are HS256 JWTs whose `info` claim carries the caller's [`Identity`].
//! The signing secret is injected once at construction; changing it (by
//! restarting with a new secret) invalidates every outstanding token.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use http::HeaderName;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use warden_common_secret::SecretString;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::types::{parse_role_names, GroupId, UserId};

/// Header carrying the opaque session token.
pub const SUBJECT_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-subject-token");

/// Header carrying the decoded identity downstream, as JSON.
pub const SUBJECT_INFO_HEADER: HeaderName = HeaderName::from_static("x-subject-info");

/// Clock skew tolerated when checking `exp` and `nbf`.
const LEEWAY_SECS: u64 = 5;

#[derive(Debug, Serialize, Deserialize)]
struct TokenInfo {
	user_id: UserId,
	name: String,
	display_name: String,
	group_id: GroupId,
	roles: Vec<String>,
	issued_at: DateTime<Utc>,
	expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
	info: TokenInfo,
	iat: i64,
	nbf: i64,
	exp: i64,
}

/// A decoded and verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
	pub identity: Identity,
	pub issued_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

pub struct SessionTokenCodec {
	encoding_key: EncodingKey,
	decoding_key: DecodingKey,
	validation: Validation,
}

impl fmt::Debug for SessionTokenCodec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionTokenCodec")
			.field("algorithm", &Algorithm::HS256)
			.finish_non_exhaustive()
	}
}

impl SessionTokenCodec {
	pub fn new(secret: &SecretString) -> AuthResult<Self> {
		if secret.is_empty() {
			return Err(AuthError::Configuration(
				"session token signing secret is empty".to_string(),
			));
		}
		let bytes = secret.expose().as_bytes();

		let mut validation = Validation::new(Algorithm::HS256);
		validation.leeway = LEEWAY_SECS;
		validation.validate_nbf = true;

		Ok(Self {
			encoding_key: EncodingKey::from_secret(bytes),
			decoding_key: DecodingKey::from_secret(bytes),
			validation,
		})
	}

	#[instrument(skip(self, identity), fields(user = %identity.name))]
	pub fn encode(
		&self,
		identity: &Identity,
		issued_at: DateTime<Utc>,
		expires_at: DateTime<Utc>,
	) -> AuthResult<String> {
		if expires_at <= issued_at {
			return Err(AuthError::InvalidInput(
				"token must expire after it is issued".to_string(),
			));
		}

		let claims = Claims {
			info: TokenInfo {
				user_id: identity.user_id,
				name: identity.name.clone(),
				display_name: identity.display_name.clone(),
				group_id: identity.group_id,
				roles: identity.roles.iter().map(|r| r.as_str().to_string()).collect(),
				issued_at,
				expires_at,
			},
			iat: issued_at.timestamp(),
			nbf: issued_at.timestamp(),
			exp: expires_at.timestamp(),
		};

		let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
			.map_err(|e| AuthError::Configuration(format!("failed to sign session token: {e}")))?;

		debug!(exp = claims.exp, "issued session token");
		Ok(token)
	}

	/// Verifies `token` and returns the identity it carries.
	pub fn decode(&self, token: &str) -> AuthResult<Identity> {
		self.decode_session(token).map(|s| s.identity)
	}

	#[instrument(skip(self, token))]
	pub fn decode_session(&self, token: &str) -> AuthResult<Session> {
		let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
			match e.kind() {
				ErrorKind::ExpiredSignature => AuthError::TokenExpired,
				ErrorKind::InvalidSignature => AuthError::TokenSignatureInvalid,
				_ => AuthError::TokenMalformed(e.to_string()),
			}
		})?;

		let info = data.claims.info;
		let roles = parse_role_names(&info.roles)
			.map_err(|e| AuthError::TokenMalformed(e.to_string()))?;

		Ok(Session {
			identity: Identity {
				user_id: info.user_id,
				name: info.name,
				display_name: info.display_name,
				group_id: info.group_id,
				roles,
			},
			issued_at: timestamp(data.claims.iat)?,
			expires_at: timestamp(data.claims.exp)?,
		})
	}
}

fn timestamp(secs: i64) -> AuthResult<DateTime<Utc>> {
	Utc.timestamp_opt(secs, 0)
		.single()
		.ok_or_else(|| AuthError::TokenMalformed(format!("timestamp {secs} out of range")))
}

/// Encodes an identity for [`SUBJECT_INFO_HEADER`].
pub fn encode_info_header(identity: &Identity) -> AuthResult<String> {
	serde_json::to_string(identity)
		.map_err(|e| AuthError::Configuration(format!("failed to encode subject info: {e}")))
}

pub fn decode_info_header(value: &str) -> AuthResult<Identity> {
	serde_json::from_str(value).map_err(|e| AuthError::TokenMalformed(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{RoleKind, DEFAULT_GROUP_ID};
	use chrono::Duration;

	const SECRET: &str = "0123456789abcdef0123456789abcdef";

	fn codec() -> SessionTokenCodec {
		SessionTokenCodec::new(&SecretString::from(SECRET)).unwrap()
	}

	fn identity() -> Identity {
		Identity {
			user_id: UserId::generate(),
			name: "alice".to_string(),
			display_name: "Alice".to_string(),
			group_id: DEFAULT_GROUP_ID,
			roles: vec![RoleKind::User, RoleKind::Admin],
		}
	}

	mod codec {
		use super::*;

		#[test]
		fn preserves_roles_and_group() {
			let codec = codec();
			let id = identity();
			let now = Utc::now();
			let token = codec.encode(&id, now, now + Duration::minutes(30)).unwrap();
			assert_eq!(codec.decode(&token).unwrap(), id);
		}

		#[test]
		fn session_reports_window() {
			let codec = codec();
			let now = Utc::now();
			let token = codec
				.encode(&identity(), now, now + Duration::minutes(30))
				.unwrap();
			let session = codec.decode_session(&token).unwrap();
			assert_eq!(session.expires_at.timestamp(), (now + Duration::minutes(30)).timestamp());
		}

		#[test]
		fn expired_token() {
			let codec = codec();
			let issued = Utc::now() - Duration::hours(2);
			let token = codec
				.encode(&identity(), issued, issued + Duration::minutes(30))
				.unwrap();
			assert!(matches!(codec.decode(&token), Err(AuthError::TokenExpired)));
		}

		#[test]
		fn other_secret_fails_signature() {
			let now = Utc::now();
			let token = codec()
				.encode(&identity(), now, now + Duration::minutes(5))
				.unwrap();
			let rotated =
				SessionTokenCodec::new(&SecretString::from("fedcba9876543210fedcba9876543210")).unwrap();
			assert!(matches!(
				rotated.decode(&token),
				Err(AuthError::TokenSignatureInvalid)
			));
		}

		#[test]
		fn garbage_is_malformed() {
			assert!(matches!(
				codec().decode("not-a-token"),
				Err(AuthError::TokenMalformed(_))
			));
		}

		#[test]
		fn unknown_role_claim_is_malformed() {
			let now = Utc::now();
			let claims = Claims {
				info: TokenInfo {
					user_id: UserId::generate(),
					name: "mallory".to_string(),
					display_name: "Mallory".to_string(),
					group_id: DEFAULT_GROUP_ID,
					roles: vec!["root".to_string()],
					issued_at: now,
					expires_at: now + Duration::minutes(5),
				},
				iat: now.timestamp(),
				nbf: now.timestamp(),
				exp: (now + Duration::minutes(5)).timestamp(),
			};
			let token = encode(
				&Header::new(Algorithm::HS256),
				&claims,
				&EncodingKey::from_secret(SECRET.as_bytes()),
			)
			.unwrap();
			assert!(matches!(
				codec().decode(&token),
				Err(AuthError::TokenMalformed(_))
			));
		}

		#[test]
		fn rejects_inverted_window() {
			let now = Utc::now();
			assert!(codec().encode(&identity(), now, now).is_err());
		}

		#[test]
		fn empty_secret_is_configuration_error() {
			assert!(matches!(
				SessionTokenCodec::new(&SecretString::from("")),
				Err(AuthError::Configuration(_))
			));
		}
	}

	mod headers {
		use super::*;

		#[test]
		fn header_names() {
			assert_eq!(SUBJECT_TOKEN_HEADER.as_str(), "x-subject-token");
			assert_eq!(SUBJECT_INFO_HEADER.as_str(), "x-subject-info");
		}

		#[test]
		fn info_header_round_trips() {
			let id = identity();
			let header = encode_info_header(&id).unwrap();
			assert!(header.contains("\"admin\""));
			assert_eq!(decode_info_header(&header).unwrap(), id);
		}

		#[test]
		fn bad_info_header_is_malformed() {
			assert!(matches!(
				decode_info_header("{\"roles\":[\"ghost\"]}"),
				Err(AuthError::TokenMalformed(_))
			));
		}
	}
}
