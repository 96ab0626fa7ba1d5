mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;

/// Matrix-driven build verification
#[derive(Parser, Debug)]
#[command(name = "forgeci", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every cell of a matrix declaration
    Run(commands::run::RunArgs),

    /// Validate a matrix declaration and show its cells
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Validate(args) => commands::validate::execute(args),
    }
}
