//! eeschema_do: run KiCad schematic editor tasks unattended.

#![allow(missing_docs)]
#![allow(clippy::exit)] // CLI uses exit codes

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use kiauto::ops::{run_erc, ErcRequest};
use kiauto_cli::common::{print_completions, print_exit_codes};
use kiauto_cli::{parse_args, run_operation, GlobalArgs};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "eeschema_do",
    version,
    about = "Run KiCad schematic editor tasks unattended"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the electrical rules check, writing <OUTPUT_DIR>/<name>.erc
    #[command(name = "run_erc")]
    RunErc {
        /// Schematic to check
        schematic: PathBuf,
        /// Directory for the report, created when missing
        output_dir: PathBuf,
        /// Fail on warnings when there are no errors
        #[arg(short, long)]
        warnings_as_errors: bool,
    },
    /// Print the exit code table
    #[command(name = "exit_codes")]
    ExitCodes {
        #[arg(long, help = "Output as JSON (default: human-readable)")]
        json: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn main() {
    let cli: Cli = parse_args();
    match cli.command {
        Commands::RunErc {
            schematic,
            output_dir,
            warnings_as_errors,
        } => {
            let request = ErcRequest {
                schematic,
                output_dir,
                warnings_as_errors,
            };
            run_operation(&cli.global, |config, automation| {
                run_erc(&request, config, automation)
            })
        }
        Commands::ExitCodes { json } => print_exit_codes(json),
        Commands::Completions { shell } => print_completions::<Cli>(shell),
    }
}
