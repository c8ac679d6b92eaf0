// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Enumerated case list and the sequential runner over it.

use std::path::Path;
use std::time::Instant;

use log::{error, info, warn};

use crate::artifact::ArtifactResolver;
use crate::case::{self, CaseError, TestCase};
use crate::config::SuiteConfig;
use crate::device::Device;
use crate::protocol::{run_case, Verdict};
use crate::report::{CaseReport, SuiteReport};

/// Ordered list of cases derived from one manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suite {
    cases: Vec<TestCase>,
}

impl Suite {
    /// Wraps already derived cases.
    pub fn from_cases(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }

    /// Enumerates the cases named in manifest text.
    pub fn from_manifest_str(input: &str) -> Result<Self, CaseError> {
        case::derive_cases(case::parse_manifest(input)).map(Self::from_cases)
    }

    /// Enumerates the cases named in the manifest file at `path`.
    pub fn load(path: &Path) -> Result<Self, CaseError> {
        case::load_manifest(path).map(Self::from_cases)
    }

    /// Cases in manifest order.
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Keeps only cases whose name contains `pattern`.
    pub fn filtered(mut self, pattern: &str) -> Self {
        self.cases.retain(|case| case.name().contains(pattern));
        self
    }

    /// Runs every case in order against one exclusively held device.
    pub fn run<D, R>(&self, device: &mut D, resolver: &R, config: &SuiteConfig) -> SuiteReport
    where
        D: Device + ?Sized,
        R: ArtifactResolver + ?Sized,
    {
        let total = self.cases.len();
        let mut report = SuiteReport::default();
        for (index, case) in self.cases.iter().enumerate() {
            info!("[{}/{}] {} (expect {})", index + 1, total, case.name(), case.expected());
            let started = Instant::now();
            let outcome = run_case(device, resolver, config, case);
            let entry = CaseReport::new(case, &outcome, started.elapsed().as_millis());
            match &outcome.verdict {
                Verdict::Passed => info!("{}", entry.line()),
                Verdict::Skipped(_) => warn!("{}", entry.line()),
                Verdict::Failed(_) => error!("{}", entry.line()),
            }
            report.cases.push(entry);
        }
        info!("{}", report.summary());
        report
    }
}
