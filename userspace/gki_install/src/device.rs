// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Device-control contract consumed by the install protocol.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors reported by a device backend.
///
/// An install that the device refuses is not an error at this level; it is
/// reported as `Ok(Some(message))` by [`Device::install_package`].
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The backend command could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The backend command exited unsuccessfully.
    #[error("`{command}` exited with {status}: {output}")]
    Command {
        /// Rendered command line.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured output.
        output: String,
    },
    /// The backend command exceeded its ceiling and was killed.
    #[error("`{command}` timed out after {timeout_ms} ms")]
    Timeout {
        /// Rendered command line.
        command: String,
        /// Ceiling that was exceeded.
        timeout_ms: u128,
    },
    /// The device answered with output the backend cannot interpret.
    #[error("unexpected device output: {0}")]
    Protocol(String),
}

/// An active APEX package as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApexInfo {
    /// Package name.
    pub name: String,
    /// Active version code.
    pub version_code: u64,
    /// Path of the backing file on the device, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<String>,
}

impl ApexInfo {
    /// Creates an entry without a source path.
    pub fn new(name: impl Into<String>, version_code: u64) -> Self {
        Self { name: name.into(), version_code, source_dir: None }
    }
}

/// Parameters of a single install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Replace an existing package (`-r`).
    pub reinstall: bool,
    /// Extra arguments forwarded to the installer, in order.
    pub extra_args: Vec<String>,
    /// Ceiling for the whole install call.
    pub timeout: Duration,
}

impl InstallOptions {
    /// Staged install that must reach the ready-to-apply state within
    /// `timeout`.
    pub fn staged_ready(timeout: Duration) -> Self {
        Self {
            reinstall: false,
            extra_args: vec!["--staged-ready-timeout".into(), timeout.as_millis().to_string()],
            timeout,
        }
    }

    /// Install without the staged-ready argument.
    pub fn plain(timeout: Duration) -> Self {
        Self { reinstall: false, extra_args: Vec::new(), timeout }
    }
}

/// Minimal device-control surface needed by the suite.
///
/// Implementations block for at most the given ceilings and never retry.
pub trait Device {
    /// Waits until the device reports boot completion. Returns `Ok(false)` when
    /// `timeout` elapses first.
    fn wait_for_boot_complete(&mut self, timeout: Duration) -> Result<bool, DeviceError>;

    /// Lists the currently active APEX packages.
    fn active_apexes(&mut self) -> Result<Vec<ApexInfo>, DeviceError>;

    /// Installs `artifact`. Returns `Ok(None)` on success and `Ok(Some(text))`
    /// when the device refused the package.
    fn install_package(
        &mut self,
        artifact: &Path,
        options: &InstallOptions,
    ) -> Result<Option<String>, DeviceError>;

    /// Reboots the device and returns once it is reachable again.
    fn reboot(&mut self) -> Result<(), DeviceError>;
}

impl<D: Device + ?Sized> Device for &mut D {
    fn wait_for_boot_complete(&mut self, timeout: Duration) -> Result<bool, DeviceError> {
        (**self).wait_for_boot_complete(timeout)
    }

    fn active_apexes(&mut self) -> Result<Vec<ApexInfo>, DeviceError> {
        (**self).active_apexes()
    }

    fn install_package(
        &mut self,
        artifact: &Path,
        options: &InstallOptions,
    ) -> Result<Option<String>, DeviceError> {
        (**self).install_package(artifact, options)
    }

    fn reboot(&mut self) -> Result<(), DeviceError> {
        (**self).reboot()
    }
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn wait_for_boot_complete(&mut self, timeout: Duration) -> Result<bool, DeviceError> {
        (**self).wait_for_boot_complete(timeout)
    }

    fn active_apexes(&mut self) -> Result<Vec<ApexInfo>, DeviceError> {
        (**self).active_apexes()
    }

    fn install_package(
        &mut self,
        artifact: &Path,
        options: &InstallOptions,
    ) -> Result<Option<String>, DeviceError> {
        (**self).install_package(artifact, options)
    }

    fn reboot(&mut self) -> Result<(), DeviceError> {
        (**self).reboot()
    }
}
