use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use forgeci_service::{validate_declaration, DeclParser, MatrixExpander};

/// Validate a matrix declaration YAML file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the matrix declaration YAML file
    pub declaration: PathBuf,

    /// Also list every cell the matrix expands to
    #[arg(long)]
    pub cells: bool,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let decl_path = &args.declaration;

    if !decl_path.exists() {
        color_eyre::eyre::bail!("Declaration file not found: {}", decl_path.display());
    }

    output::status("Validating", &format!("{}", decl_path.display()));

    let decl = match DeclParser::parse_file(decl_path) {
        Ok(d) => d,
        Err(e) => {
            output::error(&format!("Parse error:\n{}", e));
            std::process::exit(1);
        }
    };

    output::check("YAML syntax valid");

    let errors = validate_declaration(&decl);
    if !errors.is_empty() {
        output::error(&format!("{} validation error(s):", errors.len()));
        for error in &errors {
            output::error(&format!("  - [{}] {}", error.path, error.message));
        }
        std::process::exit(1);
    }

    output::check("Semantic validation passed");

    let cells = MatrixExpander::expand(&decl);
    output::check(&format!(
        "Structure: {} targets, {} instrumentation sets, {} cells",
        decl.targets.len(),
        decl.instrumentation_sets().len(),
        cells.len()
    ));

    if args.cells {
        println!();
        for cell in &cells {
            println!("  {}  ->  {}", cell.label(), cell.artifact_name(&decl.package));
        }
    }

    println!();
    output::success("Declaration is valid");

    Ok(())
}
