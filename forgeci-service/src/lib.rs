// Forgeci Service Library
// Engine for matrix-driven build verification pipelines

pub mod archive;
pub mod error;
pub mod execution;
pub mod matrix;
pub mod publish;
pub mod report;
pub mod runners;
pub mod toolchain;

// Re-export commonly used types
pub use error::{RunnerError, ServiceError, ServiceResult, ToolchainError};

// Re-export matrix types
pub use matrix::{
    validate_declaration, CellSpec, CompilerId, DeclParser, Instrumentation, InstrumentationSet,
    MatrixDeclaration, MatrixExpander, ParseError, TriggerEvent, ValidationError,
};

// Re-export execution types
pub use execution::{
    install_eligible, CellExecutor, CellOutcome, CellReport, CellRun, Collaborators, EventSender,
    ExecutionEvent, LogLevel, MatrixOrchestrator, OrchestratorConfig, PipelineOutcome,
    PipelineResult, ProgressSender, StepKind, StepLedger, StepRecord,
};

// Re-export report types
pub use report::{ReportBundle, ReportCollector, ResultStore, TestRecord, TestStatus};

// Re-export runner and publication types
pub use publish::{ArtifactPublisher, PublishPaths, PublishResult};
pub use runners::{
    ArtifactStore, BuildSystem, ConfigureMake, GitCheckout, MirrorStore, PackageProvisioner,
    PkgInstall, ProcessOutput, ProcessRunner, SourceCheckout, TapHarness, TestHarness,
};
pub use toolchain::{
    CellWorkspace, PathResolver, ResolvedTools, ToolchainEnvironment, ToolchainResolver,
};
