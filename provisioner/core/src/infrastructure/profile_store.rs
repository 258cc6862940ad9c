// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Client Profile Store
//!
//! One `<identity>.ovpn` file per provisioned client under a single
//! directory. The worker is the only writer; the gateway only reads.
//!
//! Writes go to a `tempfile::NamedTempFile` (created owner-only, since
//! profiles embed the client private key) which is then linked into place
//! with `persist_noclobber`, so the final path either does not exist or holds
//! a complete profile. Linking fails if the target exists, which makes
//! creation atomic: a repeated run for the same identity finds the earlier
//! file and compares contents instead of overwriting it. The temporary file
//! is deleted on drop, on success and on every error path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::domain::identity::{Identity, PROFILE_EXTENSION};

#[derive(Debug, Error)]
pub enum ProfileStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a different profile already exists for {0}")]
    Conflict(Identity),
}

impl ProfileStoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ProfileStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    /// Identical content was already stored.
    AlreadyPresent,
}

/// Listing entry for one stored profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileEntry {
    pub identity: Identity,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, identity: &Identity) -> PathBuf {
        self.dir.join(identity.profile_file_name())
    }

    pub async fn exists(&self, identity: &Identity) -> Result<bool, ProfileStoreError> {
        let path = self.path_for(identity);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ProfileStoreError::io(&path, e))
    }

    /// Profile bytes, or `None` if the identity has no profile.
    pub async fn read(&self, identity: &Identity) -> Result<Option<Vec<u8>>, ProfileStoreError> {
        let path = self.path_for(identity);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProfileStoreError::io(&path, e)),
        }
    }

    /// Store `contents` unless a profile already exists. An existing profile
    /// with identical bytes is [`WriteOutcome::AlreadyPresent`]; one with
    /// different bytes is a [`ProfileStoreError::Conflict`].
    pub async fn write_idempotent(
        &self,
        identity: &Identity,
        contents: &[u8],
    ) -> Result<WriteOutcome, ProfileStoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ProfileStoreError::io(&self.dir, e))?;

        let target = self.path_for(identity);
        let created = {
            let dir = self.dir.clone();
            let target = target.clone();
            let contents = contents.to_vec();
            tokio::task::spawn_blocking(move || link_new(&dir, &target, &contents))
                .await
                .map_err(|e| ProfileStoreError::io(&self.dir, std::io::Error::other(e)))??
        };

        if created {
            tracing::debug!(identity = %identity, path = %target.display(), "Profile written");
            return Ok(WriteOutcome::Created);
        }

        let existing = tokio::fs::read(&target)
            .await
            .map_err(|e| ProfileStoreError::io(&target, e))?;
        if existing == contents {
            Ok(WriteOutcome::AlreadyPresent)
        } else {
            Err(ProfileStoreError::Conflict(identity.clone()))
        }
    }

    /// All stored profiles, sorted by identity. Files that are not named
    /// `<valid identity>.ovpn` are ignored.
    pub async fn list(&self) -> Result<Vec<ProfileEntry>, ProfileStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProfileStoreError::io(&self.dir, e)),
        };

        let mut profiles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProfileStoreError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            let Some(identity) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(Identity::from_profile_file_name)
            else {
                continue;
            };
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| ProfileStoreError::io(&path, e))?;
            if !metadata.is_file() {
                continue;
            }

            profiles.push(ProfileEntry {
                identity,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        profiles.sort_by(|a, b| a.identity.as_str().cmp(b.identity.as_str()));
        Ok(profiles)
    }
}

/// Owner-only temporary file in `dir`.
fn private_temp_file(dir: &Path) -> Result<NamedTempFile, ProfileStoreError> {
    tempfile::Builder::new()
        .prefix(".profile-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| ProfileStoreError::io(dir, e))
}

/// Write `contents` to a private temporary file and link it to `target`.
/// Returns `false`, leaving `target` untouched, if it already exists.
fn link_new(dir: &Path, target: &Path, contents: &[u8]) -> Result<bool, ProfileStoreError> {
    let mut temp = private_temp_file(dir)?;
    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| ProfileStoreError::io(temp.path(), e))?;
    match temp.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(ProfileStoreError::io(target, e.error)),
    }
}
