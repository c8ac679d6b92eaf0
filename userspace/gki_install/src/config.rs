// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Suite configuration: timeouts, sentinel version and backend settings.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields the stock suite.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::InstallOptions;

/// Version code carried by every `_test_high.apex` artifact.
pub const TEST_HIGH_VERSION: u64 = 1_000_000_000;
/// Ceiling between the device being reachable and boot completion (3 min).
pub const BOOT_COMPLETE_TIMEOUT_MS: u64 = 180_000;
/// Ceiling for a single install (10 min).
pub const INSTALL_TIMEOUT_MS: u64 = 600_000;
/// Interval between boot-completion checks.
pub const BOOT_POLL_INTERVAL_MS: u64 = 1_000;

/// Result alias for configuration loading.
pub type Result<T> = core::result::Result<T, ConfigError>;

/// Errors raised while loading the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {reason}")]
    Read {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O failure.
        reason: String,
    },
    /// The document is not valid TOML for this schema.
    #[error("config parse error: {0}")]
    Toml(String),
    /// A field holds an unusable value.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// Tunables for one suite run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    /// Boot-completion ceiling, in milliseconds.
    pub boot_complete_timeout_ms: u64,
    /// Install ceiling, in milliseconds.
    pub install_timeout_ms: u64,
    /// Pass `--staged-ready-timeout` to the installer.
    pub staged_ready_timeout: bool,
    /// Version the high artifact must report after reboot.
    pub high_version: u64,
    /// adb program used by the adb backend.
    pub adb: String,
    /// Interval between boot-completion checks, in milliseconds.
    pub boot_poll_interval_ms: u64,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            boot_complete_timeout_ms: BOOT_COMPLETE_TIMEOUT_MS,
            install_timeout_ms: INSTALL_TIMEOUT_MS,
            staged_ready_timeout: true,
            high_version: TEST_HIGH_VERSION,
            adb: "adb".into(),
            boot_poll_interval_ms: BOOT_POLL_INTERVAL_MS,
        }
    }
}

impl SuiteConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).map_err(|err| ConfigError::Toml(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that every ceiling is usable.
    pub fn validate(&self) -> Result<()> {
        require_non_zero("boot_complete_timeout_ms", self.boot_complete_timeout_ms)?;
        require_non_zero("install_timeout_ms", self.install_timeout_ms)?;
        require_non_zero("boot_poll_interval_ms", self.boot_poll_interval_ms)?;
        if self.adb.trim().is_empty() {
            return Err(ConfigError::InvalidField { field: "adb", reason: "must not be empty".into() });
        }
        Ok(())
    }

    /// Boot-completion ceiling.
    pub fn boot_complete_timeout(&self) -> Duration {
        Duration::from_millis(self.boot_complete_timeout_ms)
    }

    /// Install ceiling.
    pub fn install_timeout(&self) -> Duration {
        Duration::from_millis(self.install_timeout_ms)
    }

    /// Boot-completion poll interval.
    pub fn boot_poll_interval(&self) -> Duration {
        Duration::from_millis(self.boot_poll_interval_ms)
    }

    /// Options for the install step of every case.
    pub fn install_options(&self) -> InstallOptions {
        if self.staged_ready_timeout {
            InstallOptions::staged_ready(self.install_timeout())
        } else {
            InstallOptions::plain(self.install_timeout())
        }
    }
}

fn require_non_zero(field: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(ConfigError::InvalidField { field, reason: "must be greater than zero".into() });
    }
    Ok(())
}
