// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-case and per-run results, serializable for CI consumption.

use serde::Serialize;

use crate::case::{ExpectedOutcome, TestCase};
use crate::protocol::{CaseOutcome, Verdict};

/// Reported status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Passed.
    Passed,
    /// Failed.
    Failed,
    /// Skipped.
    Skipped,
}

impl CaseStatus {
    fn label(self) -> &'static str {
        match self {
            CaseStatus::Passed => "PASS",
            CaseStatus::Failed => "FAIL",
            CaseStatus::Skipped => "SKIP",
        }
    }
}

impl From<&Verdict> for CaseStatus {
    fn from(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Passed => CaseStatus::Passed,
            Verdict::Failed(_) => CaseStatus::Failed,
            Verdict::Skipped(_) => CaseStatus::Skipped,
        }
    }
}

/// Result of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    /// Case name (the artifact file name).
    pub name: String,
    /// Package under test.
    pub package: String,
    /// Expected device behaviour.
    pub expected: ExpectedOutcome,
    /// Verdict.
    pub status: CaseStatus,
    /// Failure or skip reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Teardown reboot failure; informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
    /// Wall time spent on the case, teardown included.
    pub duration_ms: u128,
}

impl CaseReport {
    /// Builds the report for `case` from its outcome.
    pub fn new(case: &TestCase, outcome: &CaseOutcome, duration_ms: u128) -> Self {
        Self {
            name: case.name().to_string(),
            package: case.package_name().to_string(),
            expected: case.expected(),
            status: CaseStatus::from(&outcome.verdict),
            reason: outcome.verdict.reason(),
            teardown_error: outcome.teardown_error.clone(),
            duration_ms,
        }
    }

    /// One-line human summary, e.g. `PASS com.example.gki_test_high.apex`.
    pub fn line(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{} {}: {}", self.status.label(), self.name, reason),
            None => format!("{} {}", self.status.label(), self.name),
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    /// Device serial, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    /// Case reports in execution order.
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    /// Number of passed cases.
    pub fn passed(&self) -> usize {
        self.count(CaseStatus::Passed)
    }

    /// Number of failed cases.
    pub fn failed(&self) -> usize {
        self.count(CaseStatus::Failed)
    }

    /// Number of skipped cases.
    pub fn skipped(&self) -> usize {
        self.count(CaseStatus::Skipped)
    }

    /// True when no case failed. Skips do not count against the run.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Summary line printed at the end of a run.
    pub fn summary(&self) -> String {
        format!(
            "{} cases: {} passed, {} failed, {} skipped",
            self.cases.len(),
            self.passed(),
            self.failed(),
            self.skipped()
        )
    }

    /// Pretty-printed JSON including the counters.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        let value = serde_json::json!({
            "serial": self.serial,
            "passed": self.passed(),
            "failed": self.failed(),
            "skipped": self.skipped(),
            "cases": self.cases,
        });
        serde_json::to_string_pretty(&value)
    }

    fn count(&self, status: CaseStatus) -> usize {
        self.cases.iter().filter(|case| case.status == status).count()
    }
}
