// Step Ledger
// Ordered step results for one cell and the eligibility predicates over them

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::matrix::CellSpec;

/// The fixed step chain of a cell, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Provision,
    Checkout,
    Toolchain,
    Build,
    Test,
    Report,
    Install,
    Archive,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Provision => "provision",
            StepKind::Checkout => "checkout",
            StepKind::Toolchain => "toolchain",
            StepKind::Build => "build",
            StepKind::Test => "test",
            StepKind::Report => "report",
            StepKind::Install => "install",
            StepKind::Archive => "archive",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one step, immutable once recorded.
///
/// `exit_code` is the external process exit captured verbatim; `None` means
/// the step never produced an exit code (spawn failure, resolution failure).
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub kind: StepKind,
    pub exit_code: Option<i32>,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.error.is_none()
    }

    pub fn duration(&self) -> Duration {
        self.finished_at
            .duration_since(self.started_at)
            .unwrap_or(Duration::ZERO)
    }
}

/// Ordered sequence of step records for one cell (insertion order =
/// execution order). Each step runs at most once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepLedger {
    records: Vec<StepRecord>,
}

impl StepLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: StepRecord) {
        debug_assert!(
            self.get(record.kind).is_none(),
            "step {} recorded twice",
            record.kind
        );
        self.records.push(record);
    }

    pub fn get(&self, kind: StepKind) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.kind == kind)
    }

    /// Whether the step was attempted at all
    pub fn ran(&self, kind: StepKind) -> bool {
        self.get(kind).is_some()
    }

    /// Whether the step ran and exited zero
    pub fn succeeded(&self, kind: StepKind) -> bool {
        self.get(kind).map(StepRecord::succeeded).unwrap_or(false)
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Cell outcome as a pure function of the recorded results: success iff
    /// the build step and the test step both exited zero. Install and
    /// archive results never participate.
    pub fn outcome(&self) -> CellOutcome {
        if self.succeeded(StepKind::Build) && self.succeeded(StepKind::Test) {
            CellOutcome::Success
        } else {
            CellOutcome::Failed
        }
    }
}

/// Terminal status of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellOutcome {
    Success,
    Failed,
}

impl CellOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CellOutcome::Success)
    }
}

impl fmt::Display for CellOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellOutcome::Success => f.write_str("success"),
            CellOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// Install runs only for a fully green plain cell: instrumented binaries are
/// not production-representative and are never published as install artifacts.
pub fn install_eligible(ledger: &StepLedger, spec: &CellSpec) -> bool {
    ledger.succeeded(StepKind::Build)
        && ledger.succeeded(StepKind::Test)
        && spec.instrumentation.is_plain()
}

/// Tests run only against a successfully built tree
pub fn test_eligible(ledger: &StepLedger) -> bool {
    ledger.succeeded(StepKind::Build)
}

/// Reports are generated whenever the test step ran, whatever its exit code
pub fn report_eligible(ledger: &StepLedger) -> bool {
    ledger.ran(StepKind::Test)
}
