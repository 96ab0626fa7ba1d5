// Execution Engine Module
// Step ledger, cell execution, orchestration, and progress events

pub mod events;
pub mod executor;
pub mod ledger;
pub mod orchestrator;

// Re-export key types
pub use events::{progress_channel, EventSender, ExecutionEvent, LogLevel, ProgressSender};
pub use executor::{CellContext, CellExecutor, CellReport, Collaborators};
pub use ledger::{install_eligible, CellOutcome, StepKind, StepLedger, StepRecord};
pub use orchestrator::{
    CellRun, MatrixOrchestrator, OrchestratorConfig, PipelineOutcome, PipelineResult,
};
