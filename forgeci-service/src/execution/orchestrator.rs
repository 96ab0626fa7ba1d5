// Matrix Orchestrator
// Runs every cell of a declaration and folds the pipeline verdict

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{watch, Semaphore};

use crate::error::ServiceResult;
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::executor::{CellContext, CellExecutor, CellReport, Collaborators};
use crate::matrix::{CellSpec, MatrixDeclaration, MatrixExpander};
use crate::publish::{ArtifactPublisher, PublishResult};

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root under which every cell allocates its workspace
    pub workspace_root: PathBuf,
    /// Concurrent cell limit; zero means run every cell at once
    pub max_parallel: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workspace_root: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("forgeci"),
            max_parallel: 0,
        }
    }
}

/// Terminal status of a whole matrix run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineOutcome {
    Success,
    Failed,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success)
    }

    /// Process exit code for CLI callers
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineOutcome::Success => 0,
            PipelineOutcome::Failed => 1,
        }
    }
}

/// One cell's execution plus its publication results
#[derive(Debug, Clone, Serialize)]
pub struct CellRun {
    pub report: CellReport,
    pub publish: PublishResult,
}

/// Everything a matrix run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub outcome: PipelineOutcome,
    pub cells: Vec<CellRun>,
    /// Cells cancellation prevented from ever starting
    pub not_launched: Vec<CellSpec>,
    pub duration: Duration,
}

enum CellTask {
    Finished(Box<CellRun>),
    NotLaunched(CellSpec),
}

/// Runs a declaration's full matrix.
///
/// Cells are independent: they run concurrently, a failed cell never stops
/// its siblings, and each cell's archives are published the moment that cell
/// finishes rather than at the end of the run.
pub struct MatrixOrchestrator {
    config: OrchestratorConfig,
    collaborators: Collaborators,
    events: Option<ProgressSender>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl MatrixOrchestrator {
    pub fn new(config: OrchestratorConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            events: None,
            shutdown: None,
        }
    }

    pub fn with_events(mut self, events: ProgressSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Cancellation input. Cells already running finish through archiving;
    /// cells not yet started are never launched.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub async fn run(&self, decl: &MatrixDeclaration) -> ServiceResult<PipelineResult> {
        let started = Instant::now();
        let cells = MatrixExpander::expand(decl);

        self.events
            .send_event(ExecutionEvent::pipeline_started(&decl.package, cells.len()));

        let context = CellContext::from_declaration(decl, self.config.workspace_root.clone());
        let publisher = {
            let p = ArtifactPublisher::new(self.collaborators.store.clone(), decl.retention_days);
            Arc::new(match &self.events {
                Some(events) => p.with_events(events.clone()),
                None => p,
            })
        };

        let limit = if self.config.max_parallel == 0 {
            cells.len().max(1)
        } else {
            self.config.max_parallel
        };
        let semaphore = Arc::new(Semaphore::new(limit));

        let mut handles = Vec::with_capacity(cells.len());
        for spec in cells {
            let packages = decl.packages_for(&spec);
            let mut executor = CellExecutor::new(context.clone(), self.collaborators.clone());
            if let Some(events) = &self.events {
                executor = executor.with_events(events.clone());
            }
            let publisher = Arc::clone(&publisher);
            let semaphore = Arc::clone(&semaphore);
            let shutdown = self.shutdown.clone();
            let events = self.events.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return CellTask::NotLaunched(spec),
                };

                if let Some(rx) = &shutdown {
                    if *rx.borrow() {
                        events.send_event(ExecutionEvent::CellSkipped {
                            cell: spec.label(),
                            reason: "run cancelled before cell start".to_string(),
                        });
                        return CellTask::NotLaunched(spec);
                    }
                }

                let report = executor.execute(&spec, &packages).await;
                // Publish immediately so earlier cells' artifacts are
                // available while later cells still run
                let publish = publisher.publish(&report.artifact_name, &report.archives).await;
                CellTask::Finished(Box::new(CellRun { report, publish }))
            }));
        }

        let mut runs = Vec::new();
        let mut not_launched = Vec::new();
        let mut task_failure = false;
        for handle in handles {
            match handle.await {
                Ok(CellTask::Finished(run)) => runs.push(*run),
                Ok(CellTask::NotLaunched(spec)) => not_launched.push(spec),
                Err(e) => {
                    self.events.send_event(ExecutionEvent::error(
                        format!("cell task failed: {}", e),
                        None,
                    ));
                    task_failure = true;
                }
            }
        }

        // An incomplete matrix is never a success
        let all_green = runs.iter().all(|r| r.report.outcome.is_success());
        let outcome = if all_green && !task_failure && not_launched.is_empty() {
            PipelineOutcome::Success
        } else {
            PipelineOutcome::Failed
        };

        self.events.send_event(ExecutionEvent::pipeline_completed(
            &decl.package,
            outcome.is_success(),
            started.elapsed(),
        ));

        Ok(PipelineResult {
            outcome,
            cells: runs,
            not_launched,
            duration: started.elapsed(),
        })
    }
}
