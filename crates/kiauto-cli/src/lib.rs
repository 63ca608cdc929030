//! Shared command line plumbing for `eeschema_do` and `pcbnew_do`.

// CLI-specific lint allowances (CLI crate, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

pub mod common;
pub mod exit_codes;
pub mod logging;

pub use common::{parse_args, run_operation, GlobalArgs};
