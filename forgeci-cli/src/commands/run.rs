use crate::output;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;

use forgeci_service::execution::events::progress_channel;
use forgeci_service::execution::LogLevel;
use forgeci_service::{
    validate_declaration, Collaborators, ConfigureMake, DeclParser, ExecutionEvent, GitCheckout,
    MatrixOrchestrator, MirrorStore, OrchestratorConfig, PathResolver, PkgInstall, TapHarness,
    TriggerEvent,
};

/// Run every cell of a matrix declaration
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the matrix declaration YAML file
    pub declaration: PathBuf,

    /// Trigger event this run answers (manual, pre-merge, post-merge)
    #[arg(long, value_name = "EVENT", default_value = "manual")]
    pub trigger: String,

    /// Workspace root for per-cell directories
    #[arg(long, short = 'w', value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Maximum cells running at once (0 = all at once)
    #[arg(long, short = 'j', value_name = "N", default_value_t = 0)]
    pub jobs: usize,

    /// Directory finished archives are mirrored into
    #[arg(long, value_name = "DIR")]
    pub mirror: Option<PathBuf>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let decl_path = &args.declaration;

    if !decl_path.exists() {
        color_eyre::eyre::bail!("Declaration file not found: {}", decl_path.display());
    }

    let trigger = TriggerEvent::from_str(&args.trigger)
        .map_err(|e| color_eyre::eyre::eyre!("Invalid trigger: {}", e))?;

    // Parse and validate the declaration
    output::status("Parsing", &format!("{}", decl_path.display()));
    let decl = DeclParser::parse_file(decl_path)
        .map_err(|e| color_eyre::eyre::eyre!("Parse error:\n{}", e))?;

    let errors = validate_declaration(&decl);
    if !errors.is_empty() {
        output::error(&format!("{} validation error(s):", errors.len()));
        for error in &errors {
            output::error(&format!("  - [{}] {}", error.path, error.message));
        }
        std::process::exit(1);
    }

    // A declaration that does not answer this trigger is a clean no-op
    if !decl.triggers.is_empty() && !decl.triggers.contains(&trigger) {
        output::info(&format!(
            "Declaration '{}' is not triggered by '{}'; nothing to run",
            decl.package,
            trigger.as_str()
        ));
        return Ok(());
    }

    let total_cells = decl.targets.len() * decl.instrumentation_sets().len();
    output::info(&format!(
        "Matrix '{}': {} targets x {} instrumentation sets = {} cells",
        decl.package,
        decl.targets.len(),
        decl.instrumentation_sets().len(),
        total_cells
    ));

    let config = match &args.workspace {
        Some(dir) => OrchestratorConfig {
            workspace_root: dir.clone(),
            max_parallel: args.jobs,
        },
        None => OrchestratorConfig {
            max_parallel: args.jobs,
            ..OrchestratorConfig::default()
        },
    };
    let mirror_root = args
        .mirror
        .clone()
        .unwrap_or_else(|| config.workspace_root.join("artifacts"));

    let collaborators = Collaborators {
        provisioner: Arc::new(PkgInstall::apt()),
        checkout: Arc::new(GitCheckout::new()),
        build: Arc::new(ConfigureMake::new()),
        harness: Arc::new(TapHarness::new(
            decl.test.command.clone(),
            decl.test.args.clone(),
        )),
        store: Arc::new(MirrorStore::new(mirror_root.clone())),
        resolver: Arc::new(PathResolver),
    };

    // Ctrl-C requests cancellation: running cells finish through archiving,
    // unstarted cells are never launched
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let (tx, mut rx) = progress_channel();
    let orchestrator = MatrixOrchestrator::new(config.clone(), collaborators)
        .with_events(tx)
        .with_shutdown(shutdown_rx);

    let run_decl = decl.clone();
    let run_handle = tokio::spawn(async move { orchestrator.run(&run_decl).await });

    // Render progress in the foreground
    while let Some(event) = rx.recv().await {
        match &event {
            ExecutionEvent::PipelineStarted {
                package,
                total_cells,
            } => {
                println!();
                output::header(&format!("Matrix '{}' ({} cells)", package, total_cells));
            }

            ExecutionEvent::PipelineCompleted {
                success, duration, ..
            } => {
                println!();
                if *success {
                    output::success(&format!(
                        "Matrix completed successfully in {:.2}s",
                        duration.as_secs_f64()
                    ));
                } else {
                    output::failure(&format!(
                        "Matrix failed after {:.2}s",
                        duration.as_secs_f64()
                    ));
                }
            }

            ExecutionEvent::CellStarted {
                cell,
                artifact_name,
            } => {
                output::cell_header(cell, artifact_name);
            }

            ExecutionEvent::CellCompleted {
                cell,
                outcome,
                duration,
            } => {
                let line = format!(
                    "  Cell '{}' {} ({:.2}s)",
                    cell,
                    outcome,
                    duration.as_secs_f64()
                );
                if outcome.is_success() {
                    output::dim_success(&line);
                } else {
                    output::dim_failure(&line);
                }
            }

            ExecutionEvent::CellSkipped { cell, reason } => {
                output::warning(&format!("  Cell '{}' skipped: {}", cell, reason));
            }

            ExecutionEvent::StepStarted { cell, step } => {
                output::dim(&format!("    [{}] {}", cell, step));
            }

            ExecutionEvent::StepCompleted {
                cell,
                step,
                exit_code,
                success,
                duration,
            } => {
                let exit_info = match exit_code {
                    Some(code) if *code != 0 => format!(" (exit code: {})", code),
                    _ => String::new(),
                };
                let line = format!(
                    "    [{}] {} {} ({:.2}s){}",
                    cell,
                    step,
                    if *success { "OK" } else { "FAIL" },
                    duration.as_secs_f64(),
                    exit_info
                );
                if *success {
                    output::dim_success(&line);
                } else {
                    output::dim_failure(&line);
                }
            }

            ExecutionEvent::ArtifactPublished { name, .. } => {
                output::check(&format!("published {}", name));
            }

            ExecutionEvent::Log { level, message, .. } => match level {
                LogLevel::Error => output::error(message),
                LogLevel::Warning => output::warning(message),
                LogLevel::Info => output::dim(message),
            },
        }
    }

    let result = run_handle.await??;

    // Machine-readable record of the whole run
    let run_json = config.workspace_root.join("run.json");
    if let Err(e) = std::fs::write(&run_json, serde_json::to_vec_pretty(&result)?) {
        output::warning(&format!("failed to write {}: {}", run_json.display(), e));
    } else {
        output::dim(&format!("  run record: {}", run_json.display()));
    }

    let failed = result
        .cells
        .iter()
        .filter(|r| !r.report.outcome.is_success())
        .count();
    output::info(&format!(
        "{} cells run, {} failed, {} never launched; artifacts in {}",
        result.cells.len(),
        failed,
        result.not_launched.len(),
        mirror_root.display()
    ));

    if !result.outcome.is_success() {
        std::process::exit(result.outcome.exit_code());
    }

    Ok(())
}
