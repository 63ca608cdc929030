//! pcbnew_do: run KiCad board editor tasks unattended.

#![allow(missing_docs)]
#![allow(clippy::exit)] // CLI uses exit codes

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use kiauto::ops::{export_layers, run_drc, DrcRequest, ExportRequest, DEFAULT_EXPORT_NAME};
use kiauto_cli::common::{print_completions, print_exit_codes};
use kiauto_cli::{parse_args, run_operation, GlobalArgs};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "pcbnew_do",
    version,
    about = "Run KiCad board editor tasks unattended"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the design rules check, writing <OUTPUT_DIR>/<name>.rpt
    #[command(name = "run_drc")]
    RunDrc {
        /// Board to check
        board: PathBuf,
        /// Directory for the report, created when missing
        output_dir: PathBuf,
        /// Do not fail on unconnected items
        #[arg(long)]
        ignore_unconnected: bool,
    },
    /// Print board layers to a file
    Export {
        /// Board to print
        board: PathBuf,
        /// Directory for the printout, created when missing
        output_dir: PathBuf,
        /// Layers to print (F.Cu, Edge.Cuts, or names given in the board)
        #[arg(required = true)]
        layers: Vec<String>,
        /// Name of the printout inside OUTPUT_DIR
        #[arg(long, default_value = DEFAULT_EXPORT_NAME)]
        output_name: String,
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
        Commands::RunDrc {
            board,
            output_dir,
            ignore_unconnected,
        } => {
            let request = DrcRequest {
                board,
                output_dir,
                ignore_unconnected,
            };
            run_operation(&cli.global, |config, automation| {
                run_drc(&request, config, automation)
            })
        }
        Commands::Export {
            board,
            output_dir,
            layers,
            output_name,
        } => {
            let request = ExportRequest {
                board,
                output_dir,
                layers,
                output_name,
            };
            run_operation(&cli.global, |config, automation| {
                export_layers(&request, config, automation)
            })
        }
        Commands::ExitCodes { json } => print_exit_codes(json),
        Commands::Completions { shell } => print_completions::<Cli>(shell),
    }
}
