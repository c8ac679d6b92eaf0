// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Integration tests for outcome mismatches the suite must catch
//! OWNERS: @runtime
//!
//! NOTE:
//! Each test breaks one aspect of the simulated device and checks that the
//! matching failure is reported, and that teardown still reboots.

use gki_install::{run_case, CaseFailure, SuiteConfig, TestCase, Verdict, TEST_HIGH_VERSION};
use gki_install_host::{ArtifactDir, Event, SimDevice};

const PACKAGE: &str = "com.example.gki";

fn case(file_name: &str) -> TestCase {
    TestCase::from_file_name(file_name).expect("valid case")
}

fn failure(verdict: Verdict) -> CaseFailure {
    match verdict {
        Verdict::Failed(failure) => failure,
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn accepted_downgrade_is_caught() {
    let artifacts = ArtifactDir::new();
    artifacts.write_pair(PACKAGE, TEST_HIGH_VERSION, 0);
    let mut device = SimDevice::with_package(PACKAGE, 1);
    device.downgrade_protection = false;

    let outcome = run_case(
        &mut device,
        &artifacts.resolver(),
        &SuiteConfig::default(),
        &case("com.example.gki_test_low.apex"),
    );

    assert_eq!(
        failure(outcome.verdict),
        CaseFailure::DowngradeAccepted { package: PACKAGE.into() }
    );
}

#[test]
fn refusal_for_another_reason_is_caught() {
    let artifacts = ArtifactDir::new();
    artifacts.write("com.example.gki_test_low.apex", "com.example.other", 0);
    let mut device = SimDevice::with_package(PACKAGE, 1);

    let outcome = run_case(
        &mut device,
        &artifacts.resolver(),
        &SuiteConfig::default(),
        &case("com.example.gki_test_low.apex"),
    );

    match failure(outcome.verdict) {
        CaseFailure::MissingRejectionMarker { expected, actual } => {
            assert_eq!(expected, "Downgrade of APEX package com.example.gki is not allowed.");
            assert!(actual.contains("INSTALL_FAILED_INTERNAL_ERROR"));
        }
        other => panic!("unexpected failure {other:?}"),
    }
}

#[test]
fn refused_high_install_is_caught() {
    let artifacts = ArtifactDir::new();
    artifacts.write("com.example.gki_test_high.apex", PACKAGE, TEST_HIGH_VERSION);
    let mut device = SimDevice::with_package(PACKAGE, TEST_HIGH_VERSION + 1);

    let outcome = run_case(
        &mut device,
        &artifacts.resolver(),
        &SuiteConfig::default(),
        &case("com.example.gki_test_high.apex"),
    );

    match failure(outcome.verdict) {
        CaseFailure::InstallFailed(message) => {
            assert!(message.contains("Downgrade of APEX package com.example.gki is not allowed."))
        }
        other => panic!("unexpected failure {other:?}"),
    }
    // Refused high install: no verification reboot, only teardown.
    assert_eq!(device.reboots(), 1);
}

#[test]
fn wrong_version_after_reboot_is_caught() {
    let artifacts = ArtifactDir::new();
    artifacts.write("com.example.gki_test_high.apex", PACKAGE, 7);
    let mut device = SimDevice::with_package(PACKAGE, 1);

    let outcome = run_case(
        &mut device,
        &artifacts.resolver(),
        &SuiteConfig::default(),
        &case("com.example.gki_test_high.apex"),
    );

    assert_eq!(
        failure(outcome.verdict),
        CaseFailure::VersionMismatch { package: PACKAGE.into(), expected: TEST_HIGH_VERSION, actual: 7 }
    );
    assert_eq!(device.reboots(), 2);
}

#[test]
fn boot_timeout_fails_without_install() {
    let artifacts = ArtifactDir::new();
    artifacts.write_pair(PACKAGE, TEST_HIGH_VERSION, 0);
    let mut device = SimDevice::with_package(PACKAGE, 1);
    device.boots = false;
    let config = SuiteConfig { boot_complete_timeout_ms: 5, ..SuiteConfig::default() };

    let outcome = run_case(
        &mut device,
        &artifacts.resolver(),
        &config,
        &case("com.example.gki_test_high.apex"),
    );

    assert_eq!(failure(outcome.verdict), CaseFailure::BootTimeout { timeout_ms: 5 });
    assert_eq!(device.events, vec![Event::BootWait, Event::Reboot]);
}

#[test]
fn install_timeout_is_not_retried() {
    let artifacts = ArtifactDir::new();
    artifacts.write_pair(PACKAGE, TEST_HIGH_VERSION, 0);
    let mut device = SimDevice::with_package(PACKAGE, 1);
    device.install_hangs = true;

    let outcome = run_case(
        &mut device,
        &artifacts.resolver(),
        &SuiteConfig::default(),
        &case("com.example.gki_test_high.apex"),
    );

    assert!(matches!(
        failure(outcome.verdict),
        CaseFailure::Timeout { timeout_ms: 600_000, .. }
    ));
    let installs = device.events.iter().filter(|event| matches!(event, Event::Install(_))).count();
    assert_eq!(installs, 1);
}

#[test]
fn teardown_failure_does_not_mask_verdict() {
    let artifacts = ArtifactDir::new();
    artifacts.write_pair(PACKAGE, TEST_HIGH_VERSION, 0);
    let mut device = SimDevice::with_package(PACKAGE, 1);
    device.reboot_fails = true;

    let outcome = run_case(
        &mut device,
        &artifacts.resolver(),
        &SuiteConfig::default(),
        &case("com.example.gki_test_low.apex"),
    );

    assert_eq!(outcome.verdict, Verdict::Passed);
    let teardown = outcome.teardown_error.expect("teardown error recorded");
    assert!(teardown.contains("device offline"));
}

#[test]
fn plain_install_omits_staged_ready_argument() {
    let artifacts = ArtifactDir::new();
    artifacts.write_pair(PACKAGE, TEST_HIGH_VERSION, 0);
    let mut device = SimDevice::with_package(PACKAGE, 1);
    let config = SuiteConfig { staged_ready_timeout: false, ..SuiteConfig::default() };

    let outcome = run_case(
        &mut device,
        &artifacts.resolver(),
        &config,
        &case("com.example.gki_test_high.apex"),
    );

    assert_eq!(outcome.verdict, Verdict::Passed);
    assert!(device.install_args[0].is_empty());
}
