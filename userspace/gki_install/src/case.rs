// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Test case derivation from artifact file names.
//!
//! The build emits one pair of artifacts per GKI package. The file name alone
//! decides which package is under test and whether the device must accept or
//! refuse the install, so derivation is strict: a name that carries neither
//! suffix is a broken fixture and aborts enumeration.

use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Suffix of artifacts that carry the high sentinel version.
pub const HIGH_SUFFIX: &str = "_test_high.apex";
/// Suffix of artifacts that carry a version below the preinstalled one.
pub const LOW_SUFFIX: &str = "_test_low.apex";
/// Name of the manifest resource shipped next to the test artifacts.
pub const MANIFEST_FILE_NAME: &str = "gki_install_test_file_list.txt";

/// Result alias returned by case derivation.
pub type Result<T> = core::result::Result<T, CaseError>;

/// Errors emitted while enumerating test cases.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaseError {
    /// The file name carries neither recognized suffix.
    #[error("Unrecognized test data file: {0}")]
    UnrecognizedArtifact(String),
    /// The manifest could not be read.
    #[error("failed to read manifest {path}: {reason}")]
    Manifest {
        /// Path of the manifest.
        path: String,
        /// Underlying I/O failure.
        reason: String,
    },
}

/// What the device is expected to do with the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    /// Install succeeds and the sentinel version is active after reboot.
    Accept,
    /// Install is refused by downgrade protection.
    RejectDowngrade,
}

impl core::fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExpectedOutcome::Accept => f.write_str("accept"),
            ExpectedOutcome::RejectDowngrade => f.write_str("reject-downgrade"),
        }
    }
}

/// One parameterized case, derived from a single artifact file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    file_name: String,
    package_name: String,
    expected: ExpectedOutcome,
}

impl TestCase {
    /// Derives a case from `file_name`.
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let (package_name, expected) = if let Some(package) = file_name.strip_suffix(HIGH_SUFFIX)
        {
            (package, ExpectedOutcome::Accept)
        } else if let Some(package) = file_name.strip_suffix(LOW_SUFFIX) {
            (package, ExpectedOutcome::RejectDowngrade)
        } else {
            return Err(CaseError::UnrecognizedArtifact(file_name.to_string()));
        };
        if package_name.is_empty() {
            return Err(CaseError::UnrecognizedArtifact(file_name.to_string()));
        }
        Ok(Self {
            file_name: file_name.to_string(),
            package_name: package_name.to_string(),
            expected,
        })
    }

    /// Display name of the case; the artifact file name.
    pub fn name(&self) -> &str {
        &self.file_name
    }

    /// Artifact file name as listed in the manifest.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// APEX package the artifact updates.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Expected device behaviour.
    pub fn expected(&self) -> ExpectedOutcome {
        self.expected
    }
}

/// Splits manifest text into artifact file names.
///
/// Entries are whitespace separated; blank lines are ignored.
pub fn parse_manifest(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

/// Derives one case per name, preserving order. Stops at the first
/// unrecognized name.
pub fn derive_cases<I, S>(names: I) -> Result<Vec<TestCase>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|name| TestCase::from_file_name(name.as_ref())).collect()
}

/// Reads the manifest at `path` and derives its cases.
pub fn load_manifest(path: &Path) -> Result<Vec<TestCase>> {
    let text = fs::read_to_string(path).map_err(|err| CaseError::Manifest {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    derive_cases(parse_manifest(&text))
}
