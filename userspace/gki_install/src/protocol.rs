// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Install-verify protocol for a single case.
//!
//! Per case: wait for boot, gate on the package being active, check the
//! artifact, install, then judge the result against the expected outcome.
//! Accepted installs are verified after a reboot. The device is rebooted on
//! every exit path once the case has started; a failing teardown is logged
//! and reported next to the verdict, never in place of it.

use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::artifact::ArtifactResolver;
use crate::case::{ExpectedOutcome, TestCase};
use crate::config::SuiteConfig;
use crate::device::{ApexInfo, Device, DeviceError};

/// Text the device includes when it refuses a downgrade of `package`.
pub fn downgrade_marker(package: &str) -> String {
    format!("Downgrade of APEX package {package} is not allowed.")
}

/// Reasons a case failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaseFailure {
    /// Boot completion was not observed in time.
    #[error("Device did not come up after {timeout_ms} ms")]
    BootTimeout {
        /// Ceiling that elapsed.
        timeout_ms: u128,
    },
    /// A device command exceeded its ceiling.
    #[error("`{command}` timed out after {timeout_ms} ms")]
    Timeout {
        /// Command that timed out.
        command: String,
        /// Ceiling that elapsed.
        timeout_ms: u128,
    },
    /// The artifact for an eligible device is missing or empty.
    #[error("Test is not built properly. It does not contain a non-empty {file_name}: {reason}")]
    BuildConfig {
        /// Artifact file name.
        file_name: String,
        /// What was wrong with it.
        reason: String,
    },
    /// More than one active entry carries the package name.
    #[error("expected one active APEX named {package}, found {count}")]
    AmbiguousPackage {
        /// Package name.
        package: String,
        /// Number of matching entries.
        count: usize,
    },
    /// The high artifact was refused.
    #[error("Installation failed with {0}")]
    InstallFailed(String),
    /// The low artifact was accepted.
    #[error("Should not be able to install downgrade package {package}")]
    DowngradeAccepted {
        /// Package name.
        package: String,
    },
    /// The low artifact was refused for some other reason.
    #[error("install error does not contain \"{expected}\": {actual}")]
    MissingRejectionMarker {
        /// Marker that was looked for.
        expected: String,
        /// Error text the device returned.
        actual: String,
    },
    /// The package disappeared after the reboot.
    #[error("{package} is not active after reboot")]
    PackageMissing {
        /// Package name.
        package: String,
    },
    /// The package is active with an unexpected version.
    #[error("{package} reports version {actual}, expected {expected}")]
    VersionMismatch {
        /// Package name.
        package: String,
        /// Sentinel version.
        expected: u64,
        /// Version the device reported.
        actual: u64,
    },
    /// The device backend failed.
    #[error("device error: {0}")]
    Device(String),
}

impl From<DeviceError> for CaseFailure {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Timeout { command, timeout_ms } => Self::Timeout { command, timeout_ms },
            other => Self::Device(other.to_string()),
        }
    }
}

/// Terminal verdict of a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The device behaved as expected.
    Passed,
    /// The device misbehaved or the environment is broken.
    Failed(CaseFailure),
    /// The case does not apply to this device.
    Skipped(String),
}

impl Verdict {
    /// True for [`Verdict::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, Verdict::Failed(_))
    }

    /// Diagnostic text for failed and skipped cases.
    pub fn reason(&self) -> Option<String> {
        match self {
            Verdict::Passed => None,
            Verdict::Failed(failure) => Some(failure.to_string()),
            Verdict::Skipped(reason) => Some(reason.clone()),
        }
    }
}

/// Verdict plus the result of the teardown reboot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    /// Verdict recorded before teardown.
    pub verdict: Verdict,
    /// Teardown reboot failure, if any.
    pub teardown_error: Option<String>,
}

/// Reboots the device when the case scope ends.
///
/// [`TeardownGuard::finish`] performs the reboot and hands back its result.
/// If the guard is dropped without `finish` (for instance while unwinding),
/// the reboot still happens and its failure is only logged.
pub struct TeardownGuard<'a, D: Device + ?Sized> {
    device: &'a mut D,
    armed: bool,
}

impl<'a, D: Device + ?Sized> TeardownGuard<'a, D> {
    /// Arms the guard for `device`.
    pub fn new(device: &'a mut D) -> Self {
        Self { device, armed: true }
    }

    /// Device borrowed for the body of the case.
    pub fn device(&mut self) -> &mut D {
        &mut *self.device
    }

    /// Runs the teardown reboot now.
    pub fn finish(mut self) -> Result<(), DeviceError> {
        self.armed = false;
        info!("Rebooting device after case");
        self.device.reboot()
    }
}

impl<D: Device + ?Sized> Drop for TeardownGuard<'_, D> {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Err(err) = self.device.reboot() {
                warn!("teardown reboot failed: {err}");
            }
        }
    }
}

/// Runs `case` against `device` and always reboots afterwards.
pub fn run_case<D, R>(
    device: &mut D,
    resolver: &R,
    config: &SuiteConfig,
    case: &TestCase,
) -> CaseOutcome
where
    D: Device + ?Sized,
    R: ArtifactResolver + ?Sized,
{
    let mut guard = TeardownGuard::new(device);
    let verdict = match execute(guard.device(), resolver, config, case) {
        Ok(verdict) => verdict,
        Err(failure) => Verdict::Failed(failure),
    };
    let teardown_error = match guard.finish() {
        Ok(()) => None,
        Err(err) => {
            warn!("{}: teardown reboot failed: {err}", case.name());
            Some(err.to_string())
        }
    };
    CaseOutcome { verdict, teardown_error }
}

fn execute<D, R>(
    device: &mut D,
    resolver: &R,
    config: &SuiteConfig,
    case: &TestCase,
) -> Result<Verdict, CaseFailure>
where
    D: Device + ?Sized,
    R: ArtifactResolver + ?Sized,
{
    wait_for_boot(device, config.boot_complete_timeout())?;

    info!("Checking if {} is installed on the device.", case.package_name());
    let Some(current) = find_active_apex(device, case.package_name())? else {
        return Ok(Verdict::Skipped(format!(
            "{} is not installed on the device",
            case.package_name()
        )));
    };
    debug!("{} is active at version {}", current.name, current.version_code);

    let artifact = resolver.resolve(case.file_name()).map_err(|err| CaseFailure::BuildConfig {
        file_name: case.file_name().to_string(),
        reason: err.to_string(),
    })?;
    if artifact.is_empty() {
        return Err(CaseFailure::BuildConfig {
            file_name: case.file_name().to_string(),
            reason: format!("{} is empty", artifact.path.display()),
        });
    }

    let options = config.install_options();
    info!(
        "Installing {} with {} ms timeout",
        artifact.path.display(),
        options.timeout.as_millis()
    );
    let install_error = device
        .install_package(&artifact.path, &options)?
        .filter(|message| !message.trim().is_empty());

    match case.expected() {
        ExpectedOutcome::RejectDowngrade => verify_rejected(case, install_error),
        ExpectedOutcome::Accept => verify_accepted(device, config, case, install_error),
    }
}

fn verify_rejected(case: &TestCase, install_error: Option<String>) -> Result<Verdict, CaseFailure> {
    let Some(message) = install_error else {
        return Err(CaseFailure::DowngradeAccepted { package: case.package_name().to_string() });
    };
    let marker = downgrade_marker(case.package_name());
    if !message.contains(&marker) {
        return Err(CaseFailure::MissingRejectionMarker { expected: marker, actual: message });
    }
    info!("{} refused as expected", case.file_name());
    Ok(Verdict::Passed)
}

fn verify_accepted<D: Device + ?Sized>(
    device: &mut D,
    config: &SuiteConfig,
    case: &TestCase,
    install_error: Option<String>,
) -> Result<Verdict, CaseFailure> {
    if let Some(message) = install_error {
        return Err(CaseFailure::InstallFailed(message));
    }
    device.reboot()?;
    wait_for_boot(device, config.boot_complete_timeout())?;

    let Some(updated) = find_active_apex(device, case.package_name())? else {
        return Err(CaseFailure::PackageMissing { package: case.package_name().to_string() });
    };
    if updated.version_code != config.high_version {
        return Err(CaseFailure::VersionMismatch {
            package: updated.name,
            expected: config.high_version,
            actual: updated.version_code,
        });
    }
    info!("{} active at version {}", updated.name, updated.version_code);
    Ok(Verdict::Passed)
}

fn wait_for_boot<D: Device + ?Sized>(device: &mut D, timeout: Duration) -> Result<(), CaseFailure> {
    info!("Wait for device to boot complete for {} ms...", timeout.as_millis());
    if device.wait_for_boot_complete(timeout)? {
        Ok(())
    } else {
        Err(CaseFailure::BootTimeout { timeout_ms: timeout.as_millis() })
    }
}

/// Returns the single active entry named `package`, `None` if absent.
fn find_active_apex<D: Device + ?Sized>(
    device: &mut D,
    package: &str,
) -> Result<Option<ApexInfo>, CaseFailure> {
    let mut matches: Vec<ApexInfo> =
        device.active_apexes()?.into_iter().filter(|apex| apex.name == package).collect();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        count => Err(CaseFailure::AmbiguousPackage { package: package.to_string(), count }),
    }
}
