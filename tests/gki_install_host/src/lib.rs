// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Host harness for the GKI APEX install suite
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable (test-only)
//!
//! Provides a simulated device that stages installs, applies them on reboot
//! and enforces APEX downgrade protection, plus an on-disk artifact fixture.
//! Test artifacts are tiny text files (`name=<pkg>` / `version=<n>`) that the
//! simulated device reads back at install time.

#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gki_install::{ApexInfo, Device, DeviceError, DirectoryResolver, InstallOptions};
use tempfile::TempDir;

/// Device interaction recorded by [`SimDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `wait_for_boot_complete` was called.
    BootWait,
    /// Active packages were listed.
    ListApexes,
    /// An install of the named file was attempted.
    Install(String),
    /// The device was rebooted.
    Reboot,
}

/// In-memory device with apexd-like staging semantics.
#[derive(Debug)]
pub struct SimDevice {
    active: Vec<ApexInfo>,
    staged: Vec<ApexInfo>,
    /// Whether boot completion is ever reported.
    pub boots: bool,
    /// Refuse installs that lower the active version.
    pub downgrade_protection: bool,
    /// Every install exceeds its ceiling.
    pub install_hangs: bool,
    /// Every reboot fails at the transport level.
    pub reboot_fails: bool,
    /// Install arguments seen, in order.
    pub install_args: Vec<Vec<String>>,
    /// Interaction log.
    pub events: Vec<Event>,
}

impl SimDevice {
    /// A healthy device with `active` preinstalled.
    pub fn new(active: Vec<ApexInfo>) -> Self {
        Self {
            active,
            staged: Vec::new(),
            boots: true,
            downgrade_protection: true,
            install_hangs: false,
            reboot_fails: false,
            install_args: Vec::new(),
            events: Vec::new(),
        }
    }

    /// A healthy device carrying a single package.
    pub fn with_package(name: &str, version: u64) -> Self {
        Self::new(vec![ApexInfo::new(name, version)])
    }

    /// Active version of `name`, if present.
    pub fn version_of(&self, name: &str) -> Option<u64> {
        self.active.iter().find(|apex| apex.name == name).map(|apex| apex.version_code)
    }

    /// Number of reboots performed so far.
    pub fn reboots(&self) -> usize {
        self.events.iter().filter(|event| **event == Event::Reboot).count()
    }

    fn stage(&mut self, artifact: &Path) -> Option<String> {
        let Some(incoming) = read_artifact(artifact) else {
            return Some(format!(
                "Failure [INSTALL_FAILED_INVALID_APK: cannot parse {}]",
                artifact.display()
            ));
        };
        let Some(current) = self.version_of(&incoming.name) else {
            return Some(format!(
                "Failure [INSTALL_FAILED_INTERNAL_ERROR: {} is not preinstalled]",
                incoming.name
            ));
        };
        if self.downgrade_protection && incoming.version_code < current {
            return Some(format!(
                "Error [1]: Failed to commit install session 1: Downgrade of APEX package {} is \
                 not allowed. Active version: {} attempted: {}",
                incoming.name, current, incoming.version_code
            ));
        }
        self.staged.retain(|apex| apex.name != incoming.name);
        self.staged.push(incoming);
        None
    }
}

impl Device for SimDevice {
    fn wait_for_boot_complete(&mut self, _timeout: Duration) -> Result<bool, DeviceError> {
        self.events.push(Event::BootWait);
        Ok(self.boots)
    }

    fn active_apexes(&mut self) -> Result<Vec<ApexInfo>, DeviceError> {
        self.events.push(Event::ListApexes);
        Ok(self.active.clone())
    }

    fn install_package(
        &mut self,
        artifact: &Path,
        options: &InstallOptions,
    ) -> Result<Option<String>, DeviceError> {
        let name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.events.push(Event::Install(name));
        self.install_args.push(options.extra_args.clone());
        if self.install_hangs {
            return Err(DeviceError::Timeout {
                command: format!("adb install {}", artifact.display()),
                timeout_ms: options.timeout.as_millis(),
            });
        }
        Ok(self.stage(artifact))
    }

    fn reboot(&mut self) -> Result<(), DeviceError> {
        self.events.push(Event::Reboot);
        if self.reboot_fails {
            return Err(DeviceError::Command {
                command: "adb reboot".into(),
                status: "exit status: 1".into(),
                output: "error: device offline".into(),
            });
        }
        for staged in self.staged.drain(..) {
            if let Some(active) = self.active.iter_mut().find(|apex| apex.name == staged.name) {
                active.version_code = staged.version_code;
            }
        }
        Ok(())
    }
}

/// Directory of test artifacts backed by a temporary directory.
pub struct ArtifactDir {
    dir: TempDir,
}

impl ArtifactDir {
    /// Creates an empty artifact directory.
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("create artifact dir") }
    }

    /// Root of the directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes an artifact that installs `package` at `version`.
    pub fn write(&self, file_name: &str, package: &str, version: u64) -> PathBuf {
        let path = self.dir.path().join(file_name);
        fs::write(&path, format!("name={package}\nversion={version}\n")).expect("write artifact");
        path
    }

    /// Writes a zero-byte artifact, as the build does for disabled packages.
    pub fn write_empty(&self, file_name: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        fs::write(&path, b"").expect("write artifact");
        path
    }

    /// Writes the high/low pair for `package`.
    pub fn write_pair(&self, package: &str, high: u64, low: u64) {
        self.write(&format!("{package}{}", gki_install::HIGH_SUFFIX), package, high);
        self.write(&format!("{package}{}", gki_install::LOW_SUFFIX), package, low);
    }

    /// Resolver over this directory only.
    pub fn resolver(&self) -> DirectoryResolver {
        DirectoryResolver::new([self.dir.path()])
    }
}

impl Default for ArtifactDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Path of the manifest shipped with this crate.
pub fn bundled_manifest() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join("gki_install_test_file_list.txt")
}

fn read_artifact(path: &Path) -> Option<ApexInfo> {
    let text = fs::read_to_string(path).ok()?;
    let mut name = None;
    let mut version = None;
    for line in text.lines() {
        match line.split_once('=') {
            Some(("name", value)) => name = Some(value.trim().to_string()),
            Some(("version", value)) => version = value.trim().parse::<u64>().ok(),
            _ => {}
        }
    }
    Some(ApexInfo::new(name?, version?))
}
