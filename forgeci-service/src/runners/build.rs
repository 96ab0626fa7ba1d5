// Native Build System
// Drives configure/build/install against the package's build system

use std::path::Path;

use async_trait::async_trait;

use crate::error::RunnerError;
use crate::runners::process::{ProcessOutput, ProcessRunner};
use crate::toolchain::ToolchainEnvironment;

/// Build-system collaborator seam.
///
/// Success and failure travel through process exit codes only; the engine
/// never interprets build output.
#[async_trait]
pub trait BuildSystem: Send + Sync {
    /// Configure the build tree with the install prefix and one option per
    /// active instrumentation flag
    async fn configure(
        &self,
        env: &ToolchainEnvironment,
        options: &[String],
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError>;

    /// Compile with the environment's parallelism hint
    async fn build(
        &self,
        env: &ToolchainEnvironment,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError>;

    /// Install into the workspace install prefix
    async fn install(
        &self,
        env: &ToolchainEnvironment,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError>;
}

/// Autotools-style collaborator: `configure --prefix=...` then `make`
pub struct ConfigureMake {
    runner: ProcessRunner,
}

impl ConfigureMake {
    pub fn new() -> Self {
        Self {
            runner: ProcessRunner::new(),
        }
    }
}

impl Default for ConfigureMake {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildSystem for ConfigureMake {
    async fn configure(
        &self,
        env: &ToolchainEnvironment,
        options: &[String],
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError> {
        let configure = env.workspace.source_dir.join("configure");
        let mut args = vec![format!(
            "--prefix={}",
            env.workspace.install_dir.display()
        )];
        args.extend(options.iter().cloned());

        self.runner
            .run(
                &configure.display().to_string(),
                &args,
                &env.workspace.build_dir,
                &env.env_vars(),
                Some(log),
            )
            .await
    }

    async fn build(
        &self,
        env: &ToolchainEnvironment,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError> {
        self.runner
            .run(
                "make",
                &[format!("-j{}", env.tools.build_jobs)],
                &env.workspace.build_dir,
                &env.env_vars(),
                Some(log),
            )
            .await
    }

    async fn install(
        &self,
        env: &ToolchainEnvironment,
        log: &Path,
    ) -> Result<ProcessOutput, RunnerError> {
        self.runner
            .run(
                "make",
                &["install".to_string()],
                &env.workspace.build_dir,
                &env.env_vars(),
                Some(log),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CompilerId;
    use crate::toolchain::{CellWorkspace, PathResolver, ResolvedTools, ToolchainResolver};
    use std::path::PathBuf;

    fn fake_env(workspace: CellWorkspace) -> ToolchainEnvironment {
        ToolchainEnvironment {
            tools: ResolvedTools {
                cc: PathBuf::from("/usr/bin/cc"),
                cxx: PathBuf::from("/usr/bin/c++"),
                cpp: PathBuf::from("/usr/bin/cpp"),
                build_jobs: 2,
            },
            workspace,
            markers: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_configure_runs_source_script_with_prefix_and_options() {
        let temp = tempfile::tempdir().unwrap();
        let ws = CellWorkspace::allocate(temp.path(), "pkg-debian12-gcc-plain").unwrap();

        // Fake configure script that records its arguments
        let script = ws.source_dir.join("configure");
        std::fs::write(&script, "#!/bin/sh\necho \"$@\" > args.txt\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let env = fake_env(ws.clone());
        let build = ConfigureMake::new();
        let log = ws.log_path(crate::execution::StepKind::Build);

        let output = build
            .configure(&env, &["--enable-thread-sanitizer".to_string()], &log)
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(0));
        let args = std::fs::read_to_string(ws.build_dir.join("args.txt")).unwrap();
        assert!(args.contains(&format!("--prefix={}", ws.install_dir.display())));
        assert!(args.contains("--enable-thread-sanitizer"));
    }

    #[tokio::test]
    async fn test_configure_failure_propagates_exit_code() {
        let temp = tempfile::tempdir().unwrap();
        let ws = CellWorkspace::allocate(temp.path(), "pkg-debian12-gcc-plain").unwrap();

        let script = ws.source_dir.join("configure");
        std::fs::write(&script, "#!/bin/sh\nexit 7\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let env = fake_env(ws.clone());
        let build = ConfigureMake::new();
        let log = ws.log_path(crate::execution::StepKind::Build);

        let output = build.configure(&env, &[], &log).await.unwrap();
        assert_eq!(output.exit_code, Some(7));
    }

    #[tokio::test]
    async fn test_real_toolchain_env_when_available() {
        // Only meaningful where gcc is installed; otherwise skip quietly
        let Ok(tools) = PathResolver.resolve("debian12", CompilerId::Gcc) else {
            return;
        };
        let temp = tempfile::tempdir().unwrap();
        let ws = CellWorkspace::allocate(temp.path(), "pkg-debian12-gcc-plain").unwrap();
        let env = ToolchainEnvironment {
            tools,
            workspace: ws,
            markers: Default::default(),
        };
        assert!(env.env_vars().contains_key("CC"));
    }
}
