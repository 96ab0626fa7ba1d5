// Service Error Types
// Error taxonomy for the verification engine

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for engine operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Declaration file could not be parsed
    #[error("declaration error: {0}")]
    Declaration(#[from] crate::matrix::ParseError),

    /// Declaration parsed but failed validation
    #[error("invalid declaration: {0}")]
    Validation(#[from] crate::matrix::ValidationError),

    /// Filesystem failure outside any cell
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure to drive an external process
///
/// Distinct from a nonzero exit code: a `RunnerError` means the collaborator
/// process could not be spawned or its output could not be collected at all.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io failure while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Toolchain resolution failure, fatal to the cell that hit it
#[derive(Debug, Error)]
pub enum ToolchainError {
    /// A required tool could not be located on PATH. Carries enough detail
    /// to identify the missing tool, per the resolution-error contract.
    #[error("unresolved toolchain for {platform}/{compiler}: required tool '{tool}' not found")]
    UnresolvedToolchain {
        platform: String,
        compiler: String,
        tool: String,
    },

    /// Cell workspace directories could not be created
    #[error("workspace setup failed at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
