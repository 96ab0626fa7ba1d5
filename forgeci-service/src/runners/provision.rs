// Package Provisioning
// Installs a cell's declared dependencies via the platform package manager

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::RunnerError;
use crate::runners::process::{ProcessOutput, ProcessRunner};

/// Provisioning collaborator seam. Failure is fatal to the cell.
#[async_trait]
pub trait PackageProvisioner: Send + Sync {
    async fn install(
        &self,
        platform: &str,
        packages: &[String],
        cwd: &Path,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError>;
}

/// Provisioner that shells out to a package manager command
pub struct PkgInstall {
    manager: String,
    args: Vec<String>,
    runner: ProcessRunner,
}

impl PkgInstall {
    pub fn new(manager: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            manager: manager.into(),
            args,
            runner: ProcessRunner::new(),
        }
    }

    /// apt-based provisioner for Debian-family platforms
    pub fn apt() -> Self {
        Self::new(
            "apt-get",
            vec!["install".to_string(), "-y".to_string()],
        )
    }
}

#[async_trait]
impl PackageProvisioner for PkgInstall {
    async fn install(
        &self,
        _platform: &str,
        packages: &[String],
        cwd: &Path,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError> {
        if packages.is_empty() {
            // Nothing to provision; synthesize a clean exit so the ledger
            // still records the step.
            let output = ProcessOutput {
                stdout: "no packages declared".to_string(),
                stderr: String::new(),
                exit_code: Some(0),
            };
            tokio::fs::write(log, "no packages declared\nexit: Some(0)\n")
                .await
                .map_err(|e| RunnerError::Io {
                    program: self.manager.clone(),
                    source: e,
                })?;
            return Ok(output);
        }

        let mut args = self.args.clone();
        args.extend(packages.iter().cloned());

        self.runner
            .run(&self.manager, &args, cwd, &HashMap::new(), Some(log))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_package_list_is_clean_noop() {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("provision.log");
        let provisioner = PkgInstall::apt();

        let output = provisioner
            .install("debian12", &[], temp.path(), &log)
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(0));
        assert!(log.is_file());
    }

    #[tokio::test]
    async fn test_install_invokes_manager_with_packages() {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("provision.log");
        // Use `echo` as a stand-in manager so the test runs anywhere
        let provisioner = PkgInstall::new("echo", vec!["install".to_string()]);

        let output = provisioner
            .install(
                "debian12",
                &["gcc".to_string(), "make".to_string()],
                temp.path(),
                &log,
            )
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.contains("install gcc make"));
    }
}
