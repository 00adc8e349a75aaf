// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Account operations for the warden server.
//!
//! Ties the permission gate, the credential vault and the repositories
//! together:
//! - [`UserService`]: user CRUD, password reveal, authentication and the
//!   legacy password migration
//! - [`CatalogService`]: role and group management
//! - [`SessionService`]: login and token resolution
//!
//! Every failure is reported through [`AccountsError`].

pub mod catalog;
pub mod error;
pub mod session;
pub mod user;

#[cfg(test)]
mod testing;

pub use catalog::{
	CatalogService, CreateGroupRequest, CreateRoleRequest, UpdateGroupRequest, UpdateRoleRequest,
};
pub use error::{AccountsError, AccountsResult};
pub use session::{IssuedToken, SessionService};
pub use user::{CreateUserRequest, SealReport, UpdateUserRequest, UserProfile, UserService};
