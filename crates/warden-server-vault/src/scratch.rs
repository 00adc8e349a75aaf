// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-call scratch directories.
//!
//! Every seal or unseal gets its own randomly named directory (mode 0700 on
//! unix) under the scratch root. Plaintext, ciphertext and key material only
//! ever live inside it, and dropping the [`Scratch`] removes the directory
//! and everything in it, whichever way the call exits.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{trace, warn};

use crate::error::VaultResult;

#[derive(Debug)]
pub struct Scratch {
	dir: TempDir,
}

impl Scratch {
	pub async fn create(root: &Path, operation: &str) -> VaultResult<Self> {
		tokio::fs::create_dir_all(root).await?;
		let root = root.to_path_buf();
		let prefix = format!("{operation}-");
		let dir = tokio::task::spawn_blocking(move || {
			tempfile::Builder::new().prefix(&prefix).tempdir_in(&root)
		})
		.await
		.map_err(std::io::Error::other)??;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			tokio::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700)).await?;
		}
		trace!(path = %dir.path().display(), "created scratch directory");
		Ok(Self { dir })
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	pub fn file(&self, name: &str) -> PathBuf {
		self.dir.path().join(name)
	}

	/// Removes the directory now, logging instead of failing if it cannot.
	pub async fn finish(self) {
		let path = self.dir.path().to_path_buf();
		let closed = tokio::task::spawn_blocking(move || self.dir.close())
			.await
			.map_err(std::io::Error::other)
			.and_then(|result| result);
		if let Err(e) = closed {
			warn!(path = %path.display(), error = %e, "failed to remove scratch directory");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn each_call_gets_its_own_directory() {
		let root = tempfile::tempdir().unwrap();
		let a = Scratch::create(root.path(), "unseal").await.unwrap();
		let b = Scratch::create(root.path(), "unseal").await.unwrap();
		assert_ne!(a.path(), b.path());
		assert_ne!(a.file("priv_key"), b.file("priv_key"));
	}

	#[tokio::test]
	async fn drop_removes_contents() {
		let root = tempfile::tempdir().unwrap();
		let path = {
			let scratch = Scratch::create(root.path(), "seal").await.unwrap();
			std::fs::write(scratch.file("plain"), b"hunter22").unwrap();
			scratch.path().to_path_buf()
		};
		assert!(!path.exists());
	}

	#[tokio::test]
	async fn finish_removes_contents() {
		let root = tempfile::tempdir().unwrap();
		let scratch = Scratch::create(root.path(), "seal").await.unwrap();
		std::fs::write(scratch.file("plain.cpabe"), b"ciphertext").unwrap();
		let path = scratch.path().to_path_buf();
		scratch.finish().await;
		assert!(!path.exists());
		assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn directory_is_private() {
		use std::os::unix::fs::PermissionsExt;

		let root = tempfile::tempdir().unwrap();
		let scratch = Scratch::create(root.path(), "unseal").await.unwrap();
		let mode = tokio::fs::metadata(scratch.path())
			.await
			.unwrap()
			.permissions()
			.mode();
		assert_eq!(mode & 0o777, 0o700);
	}

	#[tokio::test]
	async fn missing_root_is_created() {
		let root = tempfile::tempdir().unwrap();
		let nested = root.path().join("a/b");
		let scratch = Scratch::create(&nested, "seal").await.unwrap();
		assert!(scratch.path().starts_with(&nested));
	}
}
