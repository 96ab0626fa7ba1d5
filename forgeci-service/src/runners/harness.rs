// Test Harness
// Runs the declared test command and loads its raw result store

use std::path::Path;

use async_trait::async_trait;

use crate::error::RunnerError;
use crate::report::ResultStore;
use crate::runners::process::{ProcessOutput, ProcessRunner};
use crate::toolchain::ToolchainEnvironment;

/// Harness collaborator seam.
///
/// The cell verdict comes from the run's exit code, never from the parsed
/// store; the store exists for reporting.
#[async_trait]
pub trait TestHarness: Send + Sync {
    /// Run the suite in the build tree, streaming output to `log`
    async fn run(
        &self,
        env: &ToolchainEnvironment,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError>;

    /// Load the raw result store the run left behind. A missing or garbled
    /// store yields an empty one; collection proceeds regardless.
    async fn load_store(&self, log: &Path) -> ResultStore;
}

/// Harness that runs the declared command and reads its TAP output back
/// from the step log
pub struct TapHarness {
    command: String,
    args: Vec<String>,
    runner: ProcessRunner,
}

impl TapHarness {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            runner: ProcessRunner::new(),
        }
    }
}

#[async_trait]
impl TestHarness for TapHarness {
    async fn run(
        &self,
        env: &ToolchainEnvironment,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError> {
        self.runner
            .run(
                &self.command,
                &self.args,
                &env.workspace.build_dir,
                &env.env_vars(),
                Some(log),
            )
            .await
    }

    async fn load_store(&self, log: &Path) -> ResultStore {
        match tokio::fs::read_to_string(log).await {
            Ok(contents) => ResultStore::parse_tap(&contents),
            Err(_) => ResultStore::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestStatus;
    use crate::toolchain::{CellWorkspace, ResolvedTools};
    use std::path::PathBuf;

    fn fake_env(workspace: CellWorkspace) -> ToolchainEnvironment {
        ToolchainEnvironment {
            tools: ResolvedTools {
                cc: PathBuf::from("/usr/bin/cc"),
                cxx: PathBuf::from("/usr/bin/c++"),
                cpp: PathBuf::from("/usr/bin/cpp"),
                build_jobs: 1,
            },
            workspace,
            markers: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_run_then_load_store_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let ws = CellWorkspace::allocate(temp.path(), "pkg-debian12-gcc-plain").unwrap();
        let env = fake_env(ws.clone());
        let log = ws.log_path(crate::execution::StepKind::Test);

        let harness = TapHarness::new(
            "sh",
            vec![
                "-c".to_string(),
                "printf 'ok 1 - alpha\\nnot ok 2 - beta\\n'".to_string(),
            ],
        );

        let output = harness.run(&env, &log).await.unwrap();
        assert_eq!(output.exit_code, Some(0));

        let store = harness.load_store(&log).await;
        assert_eq!(store.total(), 2);
        assert_eq!(store.count(TestStatus::Failed), 1);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported_verbatim() {
        let temp = tempfile::tempdir().unwrap();
        let ws = CellWorkspace::allocate(temp.path(), "pkg-debian12-gcc-plain").unwrap();
        let env = fake_env(ws.clone());
        let log = ws.log_path(crate::execution::StepKind::Test);

        let harness = TapHarness::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        let output = harness.run(&env, &log).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_missing_store_loads_empty() {
        let temp = tempfile::tempdir().unwrap();
        let harness = TapHarness::new("true", vec![]);

        let store = harness.load_store(&temp.path().join("absent.log")).await;
        assert!(store.is_empty());
    }
}
