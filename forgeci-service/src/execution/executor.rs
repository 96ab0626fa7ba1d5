// Cell Executor
// Drives one cell through the fixed step chain and records every result

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::archive;
use crate::error::RunnerError;
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::ledger::{
    install_eligible, report_eligible, test_eligible, CellOutcome, StepKind, StepLedger,
    StepRecord,
};
use crate::matrix::{CellSpec, MatrixDeclaration};
use crate::publish::PublishPaths;
use crate::report::ReportCollector;
use crate::runners::{
    ArtifactStore, BuildSystem, PackageProvisioner, ProcessOutput, SourceCheckout, TestHarness,
};
use crate::toolchain::{CellWorkspace, ToolchainEnvironment, ToolchainResolver};

/// Pipeline-level inputs shared by every cell of one run
#[derive(Debug, Clone)]
pub struct CellContext {
    pub package: String,
    pub repository: String,
    pub revision: String,
    pub workspace_root: PathBuf,
}

impl CellContext {
    pub fn from_declaration(decl: &MatrixDeclaration, workspace_root: PathBuf) -> Self {
        Self {
            package: decl.package.clone(),
            repository: decl.source.repository.clone(),
            revision: decl.source.revision.clone(),
            workspace_root,
        }
    }
}

/// The external-effect seams one cell drives, shared across cells
#[derive(Clone)]
pub struct Collaborators {
    pub provisioner: Arc<dyn PackageProvisioner>,
    pub checkout: Arc<dyn SourceCheckout>,
    pub build: Arc<dyn BuildSystem>,
    pub harness: Arc<dyn TestHarness>,
    pub store: Arc<dyn ArtifactStore>,
    pub resolver: Arc<dyn ToolchainResolver>,
}

/// Everything one finished cell left behind
#[derive(Debug, Clone, Serialize)]
pub struct CellReport {
    pub spec: CellSpec,
    pub artifact_name: String,
    pub outcome: CellOutcome,
    pub steps: StepLedger,
    /// Report directory on disk, when collection ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
    pub archives: PublishPaths,
    pub duration: Duration,
}

/// Manifest written into the report directory before archiving, so the
/// reports bundle describes its own cell
#[derive(Serialize)]
struct CellManifest<'a> {
    spec: &'a CellSpec,
    artifact_name: &'a str,
    outcome: CellOutcome,
    steps: &'a StepLedger,
}

/// Runs one cell start to finish.
///
/// A cell never panics its way out: every failure mode ends in a ledger
/// record, and any cell that got a workspace reaches the archive step.
pub struct CellExecutor {
    context: CellContext,
    collaborators: Collaborators,
    events: Option<ProgressSender>,
}

impl CellExecutor {
    pub fn new(context: CellContext, collaborators: Collaborators) -> Self {
        Self {
            context,
            collaborators,
            events: None,
        }
    }

    pub fn with_events(mut self, events: ProgressSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Execute the full step chain for `spec`. `packages` are the declared
    /// dependencies of the cell's (platform, compiler) pair.
    pub async fn execute(&self, spec: &CellSpec, packages: &[String]) -> CellReport {
        let started = Instant::now();
        let artifact_name = spec.artifact_name(&self.context.package);
        let label = spec.label();

        self.events
            .send_event(ExecutionEvent::cell_started(&label, &artifact_name));

        let mut ledger = StepLedger::new();
        let mut archives = PublishPaths::default();
        let mut report_dir = None;

        match CellWorkspace::allocate(&self.context.workspace_root, &artifact_name) {
            Ok(ws) => {
                self.run_chain(
                    spec,
                    packages,
                    &ws,
                    &label,
                    &artifact_name,
                    &mut ledger,
                    &mut archives,
                    &mut report_dir,
                )
                .await;
            }
            Err(e) => {
                // No workspace means no step can run and nothing exists to
                // archive; the cell fails with a single provision record.
                let now = SystemTime::now();
                ledger.record(StepRecord {
                    kind: StepKind::Provision,
                    exit_code: None,
                    started_at: now,
                    finished_at: now,
                    error: Some(format!("workspace allocation failed: {}", e)),
                });
            }
        }

        let outcome = ledger.outcome();
        self.events.send_event(ExecutionEvent::cell_completed(
            &label,
            outcome,
            started.elapsed(),
        ));

        CellReport {
            spec: spec.clone(),
            artifact_name,
            outcome,
            steps: ledger,
            report_dir,
            archives,
            duration: started.elapsed(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_chain(
        &self,
        spec: &CellSpec,
        packages: &[String],
        ws: &CellWorkspace,
        label: &str,
        artifact_name: &str,
        ledger: &mut StepLedger,
        archives: &mut PublishPaths,
        report_dir: &mut Option<PathBuf>,
    ) {
        if let Some(env) = self.fatal_steps(spec, packages, ws, label, ledger).await {
            let test_log = ws.log_path(StepKind::Test);

            // Test: exit code captured verbatim, failure is not fatal
            if test_eligible(ledger) {
                let record = self
                    .step(
                        label,
                        StepKind::Test,
                        self.collaborators.harness.run(&env, &test_log),
                    )
                    .await;
                ledger.record(record);
            }

            if report_eligible(ledger) {
                let record = self.report_step(ws, label, artifact_name, &test_log, report_dir).await;
                ledger.record(record);
            }

            if install_eligible(ledger, spec) {
                let record = self
                    .step(
                        label,
                        StepKind::Install,
                        self.collaborators
                            .build
                            .install(&env, &ws.log_path(StepKind::Install)),
                    )
                    .await;
                if !record.succeeded() {
                    self.events.send_event(ExecutionEvent::warning(
                        "install step failed; install artifact withheld",
                        Some(label.to_string()),
                    ));
                }
                ledger.record(record);
            }
        }

        self.write_manifest(spec, ws, artifact_name, ledger, label);

        // Archive runs for every cell that got a workspace, so diagnostics
        // from failed cells are never lost
        let record = self.archive_step(ws, label, ledger, archives);
        ledger.record(record);
    }

    /// Provision, checkout, toolchain, build. Any failure halts the chain;
    /// the cell falls through to archiving.
    async fn fatal_steps(
        &self,
        spec: &CellSpec,
        packages: &[String],
        ws: &CellWorkspace,
        label: &str,
        ledger: &mut StepLedger,
    ) -> Option<ToolchainEnvironment> {
        let record = self
            .step(
                label,
                StepKind::Provision,
                self.collaborators.provisioner.install(
                    &spec.platform,
                    packages,
                    &ws.root,
                    &ws.log_path(StepKind::Provision),
                ),
            )
            .await;
        let ok = record.succeeded();
        ledger.record(record);
        if !ok {
            return None;
        }

        let record = self
            .step(
                label,
                StepKind::Checkout,
                self.collaborators.checkout.materialize(
                    &self.context.repository,
                    &self.context.revision,
                    &ws.source_dir,
                    &ws.log_path(StepKind::Checkout),
                ),
            )
            .await;
        let ok = record.succeeded();
        ledger.record(record);
        if !ok {
            return None;
        }

        let env = match self.toolchain_step(spec, ws, label, ledger) {
            Some(env) => env,
            None => return None,
        };

        // Build is configure followed by compile; the record carries the
        // exit of whichever failed first
        let configure_log = ws.logs_dir.join("configure.log");
        let options = spec.instrumentation.configure_options();
        let record = self
            .step(label, StepKind::Build, async {
                let configured = self
                    .collaborators
                    .build
                    .configure(&env, &options, &configure_log)
                    .await?;
                if !configured.success() {
                    return Ok(configured);
                }
                self.collaborators
                    .build
                    .build(&env, &ws.log_path(StepKind::Build))
                    .await
            })
            .await;
        let ok = record.succeeded();
        ledger.record(record);
        if !ok {
            return None;
        }

        Some(env)
    }

    /// Toolchain resolution is in-process, so the record has no exit code on
    /// failure, only the error
    fn toolchain_step(
        &self,
        spec: &CellSpec,
        ws: &CellWorkspace,
        label: &str,
        ledger: &mut StepLedger,
    ) -> Option<ToolchainEnvironment> {
        self.events
            .send_event(ExecutionEvent::step_started(label, StepKind::Toolchain));
        let started_at = SystemTime::now();

        let resolved = self
            .collaborators
            .resolver
            .resolve(&spec.platform, spec.compiler);
        let finished_at = SystemTime::now();

        let (record, env) = match resolved {
            Ok(tools) => (
                StepRecord {
                    kind: StepKind::Toolchain,
                    exit_code: Some(0),
                    started_at,
                    finished_at,
                    error: None,
                },
                Some(ToolchainEnvironment {
                    tools,
                    workspace: ws.clone(),
                    markers: spec.env_markers(),
                }),
            ),
            Err(e) => (
                StepRecord {
                    kind: StepKind::Toolchain,
                    exit_code: None,
                    started_at,
                    finished_at,
                    error: Some(e.to_string()),
                },
                None,
            ),
        };

        self.events.send_event(ExecutionEvent::step_completed(
            label,
            StepKind::Toolchain,
            record.exit_code,
            record.succeeded(),
            record.duration(),
        ));
        ledger.record(record);
        env
    }

    async fn report_step(
        &self,
        ws: &CellWorkspace,
        label: &str,
        artifact_name: &str,
        test_log: &std::path::Path,
        report_dir: &mut Option<PathBuf>,
    ) -> StepRecord {
        self.events
            .send_event(ExecutionEvent::step_started(label, StepKind::Report));
        let started_at = SystemTime::now();

        let store = self.collaborators.harness.load_store(test_log).await;
        let result = ReportCollector::collect(&store, test_log, &ws.reports_dir, artifact_name);
        let finished_at = SystemTime::now();

        let record = match result {
            Ok(bundle) => {
                *report_dir = Some(bundle.dir);
                StepRecord {
                    kind: StepKind::Report,
                    exit_code: Some(0),
                    started_at,
                    finished_at,
                    error: None,
                }
            }
            Err(e) => {
                self.events.send_event(ExecutionEvent::warning(
                    format!("report collection failed: {}", e),
                    Some(label.to_string()),
                ));
                StepRecord {
                    kind: StepKind::Report,
                    exit_code: None,
                    started_at,
                    finished_at,
                    error: Some(e.to_string()),
                }
            }
        };

        self.events.send_event(ExecutionEvent::step_completed(
            label,
            StepKind::Report,
            record.exit_code,
            record.succeeded(),
            record.duration(),
        ));
        record
    }

    /// Drop a manifest into the report directory so the reports bundle is
    /// self-describing. Covers the steps recorded so far; archive itself is
    /// necessarily absent.
    fn write_manifest(
        &self,
        spec: &CellSpec,
        ws: &CellWorkspace,
        artifact_name: &str,
        ledger: &StepLedger,
        label: &str,
    ) {
        let manifest = CellManifest {
            spec,
            artifact_name,
            outcome: ledger.outcome(),
            steps: ledger,
        };

        let written = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .and_then(|bytes| std::fs::write(ws.reports_dir.join("cell.json"), bytes));
        if let Err(e) = written {
            self.events.send_event(ExecutionEvent::warning(
                format!("failed to write cell manifest: {}", e),
                Some(label.to_string()),
            ));
        }
    }

    fn archive_step(
        &self,
        ws: &CellWorkspace,
        label: &str,
        ledger: &StepLedger,
        archives: &mut PublishPaths,
    ) -> StepRecord {
        self.events
            .send_event(ExecutionEvent::step_started(label, StepKind::Archive));
        let started_at = SystemTime::now();
        let mut errors = Vec::new();

        let report_archive = ws.dist_dir.join("reports.tar.gz");
        match archive::pack_dir(&ws.reports_dir, &report_archive) {
            Ok(()) => archives.report_archive = Some(report_archive),
            Err(e) => errors.push(format!("reports: {}", e)),
        }

        // Install artifacts only exist for cells whose install step ran green
        if ledger.succeeded(StepKind::Install) {
            let install_archive = ws.dist_dir.join("install.tar.gz");
            match archive::pack_dir(&ws.install_dir, &install_archive) {
                Ok(()) => archives.install_archive = Some(install_archive),
                Err(e) => errors.push(format!("install: {}", e)),
            }
        }

        let record = StepRecord {
            kind: StepKind::Archive,
            exit_code: if errors.is_empty() { Some(0) } else { None },
            started_at,
            finished_at: SystemTime::now(),
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        };

        self.events.send_event(ExecutionEvent::step_completed(
            label,
            StepKind::Archive,
            record.exit_code,
            record.succeeded(),
            record.duration(),
        ));
        record
    }

    async fn step<F>(&self, label: &str, kind: StepKind, work: F) -> StepRecord
    where
        F: Future<Output = Result<ProcessOutput, RunnerError>>,
    {
        self.events
            .send_event(ExecutionEvent::step_started(label, kind));
        let started_at = SystemTime::now();
        let result = work.await;
        let finished_at = SystemTime::now();

        let record = match result {
            Ok(output) => StepRecord {
                kind,
                exit_code: output.exit_code,
                started_at,
                finished_at,
                error: None,
            },
            Err(e) => StepRecord {
                kind,
                exit_code: None,
                started_at,
                finished_at,
                error: Some(e.to_string()),
            },
        };

        self.events.send_event(ExecutionEvent::step_completed(
            label,
            kind,
            record.exit_code,
            record.succeeded(),
            record.duration(),
        ));
        record
    }
}
