// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field validation for user, role and group input.
//!
//! These checks never look at the caller. A malformed field is rejected with
//! [`AuthError::InvalidInput`] before any permission decision is made.

use regex::Regex;
use std::sync::LazyLock;
use warden_common_secret::SecretString;

use crate::error::{AuthError, AuthResult};

static NAME_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.-]{2,31}$").unwrap());

static PASSWORD_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{8,18}$").unwrap());

static EMAIL_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

static PHONE_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 -]{5,19}$").unwrap());

pub const MAX_DISPLAY_NAME_CHARS: usize = 64;
pub const MAX_ANNOTATION_CHARS: usize = 256;

pub fn validate_name(name: &str) -> AuthResult<()> {
	if NAME_REGEX.is_match(name) {
		Ok(())
	} else {
		Err(AuthError::InvalidInput(format!(
			"name '{name}' must start with a letter and be 3-32 characters of letters, digits, '_', '.' or '-'"
		)))
	}
}

/// Returns true if `candidate` has the shape of a plaintext password.
///
/// Sealed credentials are base64 ciphertext far longer than 18 characters,
/// so this also tells legacy plaintext rows apart from sealed ones.
pub fn is_password_shaped(candidate: &str) -> bool {
	PASSWORD_REGEX.is_match(candidate)
}

pub fn validate_password(password: &SecretString) -> AuthResult<()> {
	if is_password_shaped(password.expose()) {
		Ok(())
	} else {
		Err(AuthError::InvalidInput(
			"password must be 8-18 characters of letters, digits, '_' or '-'".to_string(),
		))
	}
}

pub fn validate_display_name(display_name: &str) -> AuthResult<()> {
	let chars = display_name.chars().count();
	if chars == 0 || chars > MAX_DISPLAY_NAME_CHARS {
		return Err(AuthError::InvalidInput(format!(
			"display name must be 1-{MAX_DISPLAY_NAME_CHARS} characters"
		)));
	}
	if display_name.chars().any(char::is_control) {
		return Err(AuthError::InvalidInput(
			"display name must not contain control characters".to_string(),
		));
	}
	Ok(())
}

pub fn validate_email(email: &str) -> AuthResult<()> {
	if EMAIL_REGEX.is_match(email) {
		Ok(())
	} else {
		Err(AuthError::InvalidInput(format!("invalid email address '{email}'")))
	}
}

pub fn validate_phone(phone: &str) -> AuthResult<()> {
	if PHONE_REGEX.is_match(phone) {
		Ok(())
	} else {
		Err(AuthError::InvalidInput(format!("invalid phone number '{phone}'")))
	}
}

pub fn validate_annotation(annotation: &str) -> AuthResult<()> {
	if annotation.chars().count() > MAX_ANNOTATION_CHARS {
		return Err(AuthError::InvalidInput(format!(
			"annotation must be at most {MAX_ANNOTATION_CHARS} characters"
		)));
	}
	Ok(())
}

/// The user fields present in a create or update request.
///
/// `None` means "not supplied"; only supplied fields are checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserFields<'a> {
	pub name: Option<&'a str>,
	pub password: Option<&'a SecretString>,
	pub display_name: Option<&'a str>,
	pub email: Option<&'a str>,
	pub phone: Option<&'a str>,
}

impl UserFields<'_> {
	pub fn validate(&self) -> AuthResult<()> {
		if let Some(name) = self.name {
			validate_name(name)?;
		}
		if let Some(password) = self.password {
			validate_password(password)?;
		}
		if let Some(display_name) = self.display_name {
			validate_display_name(display_name)?;
		}
		if let Some(email) = self.email {
			validate_email(email)?;
		}
		if let Some(phone) = self.phone {
			validate_phone(phone)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	mod names {
		use super::*;

		#[test]
		fn accepts_typical_names() {
			assert!(validate_name("alice").is_ok());
			assert!(validate_name("ops.team-2").is_ok());
		}

		#[test]
		fn rejects_bad_names() {
			assert!(validate_name("ab").is_err());
			assert!(validate_name("1alice").is_err());
			assert!(validate_name("al ice").is_err());
			assert!(validate_name(&"a".repeat(33)).is_err());
		}
	}

	mod passwords {
		use super::*;

		#[test]
		fn short_password_rejected() {
			let err = validate_password(&SecretString::from("abc")).unwrap_err();
			assert!(matches!(err, AuthError::InvalidInput(_)));
		}

		#[test]
		fn error_never_echoes_password() {
			let err = validate_password(&SecretString::from("has space!")).unwrap_err();
			assert!(!err.to_string().contains("has space"));
		}

		#[test]
		fn base64_ciphertext_is_not_password_shaped() {
			assert!(!is_password_shaped("AAAAAQAAAAxvcF9zZXJ2aWNlID0gMQ=="));
		}

		proptest! {
			#[test]
			fn any_pattern_password_accepted(p in "[a-zA-Z0-9_-]{8,18}") {
				prop_assert!(validate_password(&SecretString::from(p)).is_ok());
			}

			#[test]
			fn overlong_password_rejected(p in "[a-z]{19,40}") {
				prop_assert!(validate_password(&SecretString::from(p)).is_err());
			}
		}
	}

	mod profile {
		use super::*;

		#[test]
		fn display_name_rules() {
			assert!(validate_display_name("Alice Example").is_ok());
			assert!(validate_display_name("").is_err());
			assert!(validate_display_name("tab\there").is_err());
			assert!(validate_display_name(&"é".repeat(64)).is_ok());
			assert!(validate_display_name(&"é".repeat(65)).is_err());
		}

		#[test]
		fn email_and_phone() {
			assert!(validate_email("a@example.com").is_ok());
			assert!(validate_email("a@example").is_err());
			assert!(validate_phone("+44 20 7946 0958").is_ok());
			assert!(validate_phone("12ab").is_err());
		}

		#[test]
		fn unsupplied_fields_are_skipped() {
			assert!(UserFields::default().validate().is_ok());
		}

		#[test]
		fn first_bad_field_fails_the_set() {
			let password = SecretString::from("abc");
			let fields = UserFields {
				name: Some("alice"),
				password: Some(&password),
				..Default::default()
			};
			assert!(matches!(fields.validate(), Err(AuthError::InvalidInput(_))));
		}
	}
}
