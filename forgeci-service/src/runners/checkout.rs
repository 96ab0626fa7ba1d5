// Source Checkout
// Materializes the package source tree at a revision

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::RunnerError;
use crate::runners::process::{ProcessOutput, ProcessRunner};

/// Checkout collaborator seam. Failure is fatal to the cell.
#[async_trait]
pub trait SourceCheckout: Send + Sync {
    /// Materialize `repository` at `revision` into `dest`
    async fn materialize(
        &self,
        repository: &str,
        revision: &str,
        dest: &Path,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError>;
}

/// Checkout collaborator driving the git CLI
pub struct GitCheckout {
    runner: ProcessRunner,
}

impl GitCheckout {
    pub fn new() -> Self {
        Self {
            runner: ProcessRunner::new(),
        }
    }
}

impl Default for GitCheckout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceCheckout for GitCheckout {
    async fn materialize(
        &self,
        repository: &str,
        revision: &str,
        dest: &Path,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError> {
        // A stale tree from a previous run would make `git clone` fail
        let _ = tokio::fs::remove_dir_all(dest).await;

        let parent = dest.parent().unwrap_or(Path::new("."));
        let env = HashMap::new();

        let clone = self
            .runner
            .run(
                "git",
                &[
                    "clone".to_string(),
                    repository.to_string(),
                    dest.display().to_string(),
                ],
                parent,
                &env,
                Some(log),
            )
            .await?;
        if !clone.success() {
            return Ok(clone);
        }

        self.runner
            .run(
                "git",
                &[
                    "-C".to_string(),
                    dest.display().to_string(),
                    "checkout".to_string(),
                    "--detach".to_string(),
                    revision.to_string(),
                ],
                parent,
                &env,
                Some(log),
            )
            .await
    }
}
