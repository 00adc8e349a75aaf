// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for identities and the role hierarchy.
//!
//! - **ID newtypes**: [`UserId`] wraps a UUID; [`RoleId`] and [`GroupId`] wrap
//!   the integer keys of the role and group catalogs.
//! - **[`RoleKind`]**: the three privilege levels. Rank is the only basis of
//!   comparison and the name/rank/builtin-id table is fixed.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

macro_rules! define_key_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(i64);

		impl $name {
			pub const fn new(id: i64) -> Self {
				Self(id)
			}

			pub const fn get(self) -> i64 {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<i64> for $name {
			fn from(id: i64) -> Self {
				Self(id)
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_key_type!(RoleId, "Key of a role in the role catalog.");
define_key_type!(GroupId, "Key of a group in the group catalog.");

/// Group every new user lands in unless told otherwise.
pub const DEFAULT_GROUP_ID: GroupId = GroupId::new(1);

/// Reserved group holding every OperatorService user.
pub const OPERATOR_GROUP_ID: GroupId = GroupId::new(999);

// =============================================================================
// Role Kinds
// =============================================================================

/// Privilege level granted by a role.
///
/// Ordering follows [`RoleKind::rank`], so `max()` over a set of kinds is the
/// highest privilege held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
	/// Regular account, manages only itself.
	User,
	/// Manages users in its own group.
	Admin,
	/// Service operator, manages everything.
	#[serde(rename = "op_service")]
	OperatorService,
}

impl RoleKind {
	/// Returns all role kinds in ascending rank order.
	pub fn all() -> &'static [RoleKind] {
		&[RoleKind::User, RoleKind::Admin, RoleKind::OperatorService]
	}

	pub const fn rank(self) -> u8 {
		match self {
			RoleKind::User => 1,
			RoleKind::Admin => 2,
			RoleKind::OperatorService => 3,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			RoleKind::User => "user",
			RoleKind::Admin => "admin",
			RoleKind::OperatorService => "op_service",
		}
	}

	pub const fn lowest() -> RoleKind {
		RoleKind::User
	}

	/// Id of the builtin catalog role granting this kind.
	pub const fn builtin_role_id(self) -> RoleId {
		match self {
			RoleKind::User => RoleId::new(1),
			RoleKind::Admin => RoleId::new(888),
			RoleKind::OperatorService => RoleId::new(999),
		}
	}

	/// Maps a builtin role id back to its kind. Any other id is an error,
	/// never a default rank.
	pub fn from_builtin_role_id(id: RoleId) -> AuthResult<RoleKind> {
		RoleKind::all()
			.iter()
			.copied()
			.find(|kind| kind.builtin_role_id() == id)
			.ok_or_else(|| AuthError::UnknownRole(format!("role id {id}")))
	}

	/// Returns true if this kind is at least as privileged as `other`.
	pub fn at_least(self, other: RoleKind) -> bool {
		self.rank() >= other.rank()
	}
}

impl PartialOrd for RoleKind {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for RoleKind {
	fn cmp(&self, other: &Self) -> Ordering {
		self.rank().cmp(&other.rank())
	}
}

impl fmt::Display for RoleKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for RoleKind {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		RoleKind::all()
			.iter()
			.copied()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| AuthError::UnknownRole(s.to_string()))
	}
}

/// `rank(a) >= rank(b)`.
pub fn at_least(a: RoleKind, b: RoleKind) -> bool {
	a.at_least(b)
}

/// Highest kind by rank; the lowest kind when `roles` is empty.
pub fn highest_of<I>(roles: I) -> RoleKind
where
	I: IntoIterator<Item = RoleKind>,
{
	roles.into_iter().max().unwrap_or_else(RoleKind::lowest)
}

/// Parses canonical role names, failing on the first unknown one.
pub fn parse_role_names<I, S>(names: I) -> AuthResult<Vec<RoleKind>>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	names.into_iter().map(|n| n.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn role_kind() -> impl Strategy<Value = RoleKind> {
		prop_oneof![
			Just(RoleKind::User),
			Just(RoleKind::Admin),
			Just(RoleKind::OperatorService),
		]
	}

	mod id_types {
		use super::*;

		#[test]
		fn user_id_serializes_as_uuid() {
			let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
			let json = serde_json::to_string(&UserId::new(uuid)).unwrap();
			assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");
		}

		#[test]
		fn group_id_serializes_as_integer() {
			assert_eq!(serde_json::to_string(&OPERATOR_GROUP_ID).unwrap(), "999");
			let id: GroupId = serde_json::from_str("1").unwrap();
			assert_eq!(id, DEFAULT_GROUP_ID);
		}

		proptest! {
			#[test]
			fn user_id_display_matches_uuid(a: u128) {
				let uuid = Uuid::from_u128(a);
				prop_assert_eq!(UserId::new(uuid).to_string(), uuid.to_string());
			}
		}
	}

	mod hierarchy {
		use super::*;

		#[test]
		fn ranks_strictly_increase() {
			let ranks: Vec<u8> = RoleKind::all().iter().map(|k| k.rank()).collect();
			assert!(ranks.windows(2).all(|w| w[0] < w[1]));
		}

		#[test]
		fn at_least_is_non_strict() {
			assert!(at_least(RoleKind::Admin, RoleKind::Admin));
			assert!(at_least(RoleKind::OperatorService, RoleKind::User));
			assert!(!at_least(RoleKind::User, RoleKind::Admin));
		}

		#[test]
		fn highest_of_empty_is_lowest() {
			assert_eq!(highest_of(Vec::new()), RoleKind::User);
		}

		#[test]
		fn highest_of_picks_max() {
			assert_eq!(
				highest_of([RoleKind::User, RoleKind::OperatorService, RoleKind::Admin]),
				RoleKind::OperatorService
			);
		}

		proptest! {
			#[test]
			fn highest_of_ignores_order(mut roles in prop::collection::vec(role_kind(), 0..8)) {
				let forward = highest_of(roles.clone());
				roles.reverse();
				prop_assert_eq!(forward, highest_of(roles.clone()));
				roles.sort();
				prop_assert_eq!(forward, highest_of(roles));
			}

			#[test]
			fn highest_of_dominates_every_member(roles in prop::collection::vec(role_kind(), 1..8)) {
				let top = highest_of(roles.clone());
				prop_assert!(roles.iter().all(|r| top.at_least(*r)));
			}

			#[test]
			fn at_least_matches_rank(a in role_kind(), b in role_kind()) {
				prop_assert_eq!(a.at_least(b), a.rank() >= b.rank());
				prop_assert!(a.at_least(b) || b.at_least(a));
			}
		}
	}

	mod names {
		use super::*;

		#[test]
		fn canonical_names_round_trip() {
			for kind in RoleKind::all() {
				assert_eq!(kind.as_str().parse::<RoleKind>().unwrap(), *kind);
			}
		}

		#[test]
		fn unknown_name_is_an_error() {
			assert!(matches!(
				"root".parse::<RoleKind>(),
				Err(AuthError::UnknownRole(name)) if name == "root"
			));
			assert!("".parse::<RoleKind>().is_err());
			assert!("Admin".parse::<RoleKind>().is_err());
		}

		#[test]
		fn serde_uses_canonical_names() {
			let json = serde_json::to_string(&RoleKind::OperatorService).unwrap();
			assert_eq!(json, "\"op_service\"");
			assert!(serde_json::from_str::<RoleKind>("\"superuser\"").is_err());
		}

		#[test]
		fn builtin_ids_are_a_fixed_table() {
			assert_eq!(RoleKind::Admin.builtin_role_id(), RoleId::new(888));
			assert_eq!(
				RoleKind::from_builtin_role_id(RoleId::new(999)).unwrap(),
				RoleKind::OperatorService
			);
			assert!(RoleKind::from_builtin_role_id(RoleId::new(0)).is_err());
			assert!(RoleKind::from_builtin_role_id(RoleId::new(2)).is_err());
		}

		#[test]
		fn parse_role_names_fails_on_any_unknown() {
			assert_eq!(
				parse_role_names(["user", "admin"]).unwrap(),
				vec![RoleKind::User, RoleKind::Admin]
			);
			assert!(parse_role_names(["user", "ghost"]).is_err());
		}
	}
}
