// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: GKI APEX install compatibility suite (host side)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: unit tests per module + tests/gki_install_host
//!
//! PUBLIC API: Suite, TestCase, Device, ArtifactResolver, run_case(), SuiteConfig
//! DEPENDS_ON: a device-control backend (adb via `backend-adb`), test artifacts on disk
//!
//! Each manifest entry names a test APEX (`<package>_test_high.apex` or
//! `<package>_test_low.apex`). The high artifact must install, survive a
//! reboot and report the sentinel version; the low artifact must be refused
//! by the device's downgrade protection. Devices that do not carry the
//! package are skipped, and every executed case ends with a reboot.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

#[cfg(feature = "backend-adb")]
pub mod adb;
pub mod artifact;
pub mod case;
pub mod config;
pub mod device;
pub mod protocol;
pub mod report;
pub mod suite;

#[cfg(feature = "backend-adb")]
pub use adb::AdbDevice;
pub use artifact::{ArtifactError, ArtifactResolver, DirectoryResolver, ResolvedArtifact};
pub use case::{CaseError, ExpectedOutcome, TestCase, HIGH_SUFFIX, LOW_SUFFIX};
pub use config::{ConfigError, SuiteConfig, TEST_HIGH_VERSION};
pub use device::{ApexInfo, Device, DeviceError, InstallOptions};
pub use protocol::{downgrade_marker, run_case, CaseFailure, CaseOutcome, TeardownGuard, Verdict};
pub use report::{CaseReport, CaseStatus, SuiteReport};
pub use suite::Suite;
