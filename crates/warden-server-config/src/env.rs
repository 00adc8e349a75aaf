// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment variable readers.
//!
//! Plain settings come from `WARDEN_SERVER_*` variables. Secrets additionally
//! honor the `VAR_FILE` convention so the token signing key can be mounted
//! from a secrets volume instead of living in the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::{env, fs};

use thiserror::Error;
use warden_common_secret::SecretString;

use crate::error::ConfigError;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Loads a secret from `{var}_FILE` (preferred) or `{var}`.
///
/// A single trailing newline is stripped from file contents. Returns
/// `Ok(None)` when neither variable is set.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|source| SecretEnvError::Io {
			path: path.clone(),
			source,
		})?;

		let value = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(Some(SecretString::new(value)));
	}

	Ok(env::var(var).ok().map(SecretString::new))
}

pub(crate) fn env_var(name: &str) -> Option<String> {
	env::var(name).ok().filter(|s| !s.is_empty())
}

pub(crate) fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("cannot parse '{v}' as {}", std::any::type_name::<T>()),
		}),
		None => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	mod secrets {
		use super::*;

		#[test]
		fn unset_returns_none() {
			let var = "WARDEN_TEST_SECRET_UNSET";
			env::remove_var(var);
			env::remove_var(format!("{var}_FILE"));
			assert!(load_secret_env(var).unwrap().is_none());
		}

		#[test]
		fn file_wins_over_direct_value() {
			let var = "WARDEN_TEST_SECRET_PRECEDENCE";
			let mut file = NamedTempFile::new().unwrap();
			writeln!(file, "from-file").unwrap();

			env::set_var(var, "from-env");
			env::set_var(format!("{var}_FILE"), file.path());

			let secret = load_secret_env(var).unwrap().unwrap();
			assert_eq!(secret.expose(), "from-file");

			env::remove_var(var);
			env::remove_var(format!("{var}_FILE"));
		}

		#[test]
		fn empty_file_path_is_an_error() {
			let var = "WARDEN_TEST_SECRET_EMPTY_PATH";
			env::set_var(format!("{var}_FILE"), "");
			let result = load_secret_env(var);
			assert!(matches!(result, Err(SecretEnvError::EmptyPath { .. })));
			env::remove_var(format!("{var}_FILE"));
		}

		#[test]
		fn missing_file_is_io_error() {
			let var = "WARDEN_TEST_SECRET_MISSING_FILE";
			env::set_var(format!("{var}_FILE"), "/nonexistent/warden/secret");
			let result = load_secret_env(var);
			assert!(matches!(result, Err(SecretEnvError::Io { .. })));
			env::remove_var(format!("{var}_FILE"));
		}
	}

	mod parsing {
		use super::*;

		#[test]
		fn empty_value_counts_as_unset() {
			let var = "WARDEN_TEST_EMPTY_VALUE";
			env::set_var(var, "");
			assert!(env_var(var).is_none());
			env::remove_var(var);
		}

		#[test]
		fn invalid_number_reports_key() {
			let var = "WARDEN_TEST_BAD_NUMBER";
			env::set_var(var, "thirty");
			let err = env_parse::<u64>(var).unwrap_err();
			assert!(err.to_string().contains(var));
			env::remove_var(var);
		}
	}
}
