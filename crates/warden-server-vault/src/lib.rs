// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-scoped credential vault.
//!
//! Passwords are sealed with an attribute-based encryption engine under a
//! policy derived from the owner's highest [`RoleKind`](warden_server_auth::RoleKind),
//! and can only be unsealed with a key generated for that role or one that
//! dominates it.
//!
//! - [`AbeEngine`] is the cryptosystem capability; [`CpabeCliEngine`] drives
//!   the cpabe toolkit binaries.
//! - [`CredentialVault`] owns the protocol: key artifact checks, per-call
//!   scratch directories, base64 storage encoding and a timeout around every
//!   engine call.
//!
//! # Security
//!
//! - Plaintext and private keys only exist inside a scratch directory private
//!   to one call and removed when the call ends, on success or failure.
//! - A key that does not satisfy the policy yields [`VaultError::NoPermission`],
//!   never ciphertext or a transport error.

pub mod cpabe;
pub mod engine;
pub mod error;
pub mod policy;
pub mod scratch;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vault;

pub use cpabe::CpabeCliEngine;
pub use engine::{AbeEngine, EngineKeys};
pub use error::{VaultError, VaultResult};
pub use policy::{parse_role, KeyAttributes, Policy};
pub use vault::{CredentialState, CredentialVault, KeyStatus, SealedCredential};
