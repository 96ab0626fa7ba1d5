// Process Runner
// Runs external collaborator processes and captures their output

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::RunnerError;

/// Output collected from one external process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code, captured verbatim (`None` if terminated by signal)
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runner for external processes.
///
/// One blocking wait per invocation; stdout and stderr are drained
/// concurrently so a chatty build cannot deadlock the pipe buffers.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run a program to completion and capture its output.
    ///
    /// When `log_path` is given, the combined output is also written there so
    /// the report archive carries a durable copy of the step's log.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
        log_path: Option<&Path>,
    ) -> Result<ProcessOutput, RunnerError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.current_dir(cwd);
        cmd.envs(env);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| RunnerError::Spawn {
            program: program.to_string(),
            source: e,
        })?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let stdout_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut output = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&line);
            }
            output
        });

        let stderr_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut output = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&line);
            }
            output
        });

        let status = child.wait().await.map_err(|e| RunnerError::Io {
            program: program.to_string(),
            source: e,
        })?;

        let stdout = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();
        let exit_code = status.code();

        let output = ProcessOutput {
            stdout,
            stderr,
            exit_code,
        };

        if let Some(path) = log_path {
            self.write_log(program, args, &output, path)
                .await
                .map_err(|e| RunnerError::Io {
                    program: program.to_string(),
                    source: e,
                })?;
        }

        Ok(output)
    }

    async fn write_log(
        &self,
        program: &str,
        args: &[String],
        output: &ProcessOutput,
        path: &Path,
    ) -> std::io::Result<()> {
        let mut log = format!("$ {} {}\n", program, args.join(" "));
        log.push_str(&output.stdout);
        if !output.stdout.is_empty() {
            log.push('\n');
        }
        if !output.stderr.is_empty() {
            log.push_str("--- stderr ---\n");
            log.push_str(&output.stderr);
            log.push('\n');
        }
        log.push_str(&format!("exit: {:?}\n", output.exit_code));
        tokio::fs::write(path, log).await
    }
}
