// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization core for warden.
//!
//! This crate provides:
//! - The [`RoleKind`] hierarchy with a single non-strict comparison,
//!   [`at_least`], and [`highest_of`]
//! - The caller [`Identity`] decoded from a session token
//! - Permission decisions in [`gate`], one predicate per mutation
//! - Field validation that runs before any permission decision
//! - The HS256 [`SessionTokenCodec`]
//!
//! Nothing here touches storage or the ABE engine; every function is a pure
//! decision over the facts it is given.

pub mod error;
pub mod gate;
pub mod identity;
pub mod token;
pub mod types;
pub mod validation;

pub use error::{AuthError, AuthResult};
pub use gate::{Assignment, Decision, RoleGrant, TargetUser};
pub use identity::Identity;
pub use token::{
	decode_info_header, encode_info_header, Session, SessionTokenCodec, SUBJECT_INFO_HEADER,
	SUBJECT_TOKEN_HEADER,
};
pub use types::{
	at_least, highest_of, parse_role_names, GroupId, RoleId, RoleKind, UserId, DEFAULT_GROUP_ID,
	OPERATOR_GROUP_ID,
};
pub use validation::UserFields;
