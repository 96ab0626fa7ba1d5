// Execution Events
// Progress reporting for matrix runs

use std::time::Duration;

use tokio::sync::mpsc;

use crate::execution::ledger::{CellOutcome, StepKind};

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during a matrix run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Matrix run started
    PipelineStarted {
        package: String,
        total_cells: usize,
    },

    /// Matrix run completed
    PipelineCompleted {
        package: String,
        success: bool,
        duration: Duration,
    },

    /// Cell execution started
    CellStarted {
        cell: String,
        artifact_name: String,
    },

    /// Cell execution completed
    CellCompleted {
        cell: String,
        outcome: CellOutcome,
        duration: Duration,
    },

    /// Cell was never launched (pipeline cancelled before it started)
    CellSkipped { cell: String, reason: String },

    /// Step execution started within a cell
    StepStarted { cell: String, step: StepKind },

    /// Step execution completed within a cell
    StepCompleted {
        cell: String,
        step: StepKind,
        exit_code: Option<i32>,
        success: bool,
        duration: Duration,
    },

    /// An archive was handed to the artifact store
    ArtifactPublished { cell: String, name: String },

    /// Log message (best-effort failures surface here)
    Log {
        level: LogLevel,
        message: String,
        cell: Option<String>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl ExecutionEvent {
    pub fn pipeline_started(package: impl Into<String>, total_cells: usize) -> Self {
        Self::PipelineStarted {
            package: package.into(),
            total_cells,
        }
    }

    pub fn pipeline_completed(
        package: impl Into<String>,
        success: bool,
        duration: Duration,
    ) -> Self {
        Self::PipelineCompleted {
            package: package.into(),
            success,
            duration,
        }
    }

    pub fn cell_started(cell: impl Into<String>, artifact_name: impl Into<String>) -> Self {
        Self::CellStarted {
            cell: cell.into(),
            artifact_name: artifact_name.into(),
        }
    }

    pub fn cell_completed(
        cell: impl Into<String>,
        outcome: CellOutcome,
        duration: Duration,
    ) -> Self {
        Self::CellCompleted {
            cell: cell.into(),
            outcome,
            duration,
        }
    }

    pub fn step_started(cell: impl Into<String>, step: StepKind) -> Self {
        Self::StepStarted {
            cell: cell.into(),
            step,
        }
    }

    pub fn step_completed(
        cell: impl Into<String>,
        step: StepKind,
        exit_code: Option<i32>,
        success: bool,
        duration: Duration,
    ) -> Self {
        Self::StepCompleted {
            cell: cell.into(),
            step,
            exit_code,
            success,
            duration,
        }
    }

    pub fn info(message: impl Into<String>, cell: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
            cell,
        }
    }

    pub fn warning(message: impl Into<String>, cell: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            cell,
        }
    }

    pub fn error(message: impl Into<String>, cell: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
            cell,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel() {
        let (tx, mut rx) = progress_channel();

        tx.send_event(ExecutionEvent::pipeline_started("pkg", 4));
        tx.send_event(ExecutionEvent::cell_started(
            "debian12/gcc/plain",
            "pkg-debian12-gcc-plain",
        ));

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, ExecutionEvent::PipelineStarted { .. }));

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(event2, ExecutionEvent::CellStarted { .. }));
    }

    #[test]
    fn test_optional_sender_is_noop() {
        let sender: Option<ProgressSender> = None;
        sender.send_event(ExecutionEvent::info("test", None));
    }

    #[test]
    fn test_step_completed_construction() {
        let event = ExecutionEvent::step_completed(
            "debian12/gcc/plain",
            StepKind::Build,
            Some(0),
            true,
            Duration::from_secs(30),
        );

        if let ExecutionEvent::StepCompleted {
            cell,
            step,
            exit_code,
            success,
            ..
        } = event
        {
            assert_eq!(cell, "debian12/gcc/plain");
            assert_eq!(step, StepKind::Build);
            assert_eq!(exit_code, Some(0));
            assert!(success);
        } else {
            panic!("wrong event type");
        }
    }
}
