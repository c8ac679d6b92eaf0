// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resolution of test artifacts shipped alongside the suite.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Errors raised while locating an artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The name is not a plain file name (separators or `..`).
    #[error("invalid artifact name `{0}`")]
    InvalidName(String),
    /// No search directory contains the artifact.
    #[error("test artifact {0} not found in any search directory")]
    NotFound(String),
    /// The artifact exists but could not be inspected.
    #[error("failed to stat {path}: {source}")]
    Io {
        /// Candidate path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// A located artifact and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Absolute or search-relative path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub len: u64,
}

impl ResolvedArtifact {
    /// True for zero-byte files, which the build emits for disabled packages.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Maps an artifact file name to a file on the host.
pub trait ArtifactResolver {
    /// Locates `file_name`.
    fn resolve(&self, file_name: &str) -> Result<ResolvedArtifact, ArtifactError>;
}

/// Searches an ordered list of directories; the first hit wins.
#[derive(Debug, Clone, Default)]
pub struct DirectoryResolver {
    dirs: Vec<PathBuf>,
}

impl DirectoryResolver {
    /// Creates a resolver over `dirs`.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self { dirs: dirs.into_iter().map(Into::into).collect() }
    }

    /// Directories searched, in order.
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl ArtifactResolver for DirectoryResolver {
    fn resolve(&self, file_name: &str) -> Result<ResolvedArtifact, ArtifactError> {
        if !is_plain_file_name(file_name) {
            return Err(ArtifactError::InvalidName(file_name.to_string()));
        }
        for dir in &self.dirs {
            let candidate = dir.join(file_name);
            match fs::metadata(&candidate) {
                Ok(meta) if meta.is_file() => {
                    return Ok(ResolvedArtifact { path: candidate, len: meta.len() });
                }
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(ArtifactError::Io { path: candidate, source }),
            }
        }
        Err(ArtifactError::NotFound(file_name.to_string()))
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}
