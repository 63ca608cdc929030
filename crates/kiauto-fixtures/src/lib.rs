//! Test harness for the `eeschema_do` and `pcbnew_do` integration tests.
//!
//! - [`TestContext`] - isolated per-test directory, CLI runner, stderr search
//! - [`FakeTools`] - shell-script stand-ins for KiCad, xdotool and ffmpeg
//! - [`RunningCli`] - a CLI run in its own process group, for signal tests
//! - [`temp_dir`] - unique temporary directories
//!
//! # Example
//!
//! ```ignore
//! use kiauto::ExitCode;
//! use kiauto::kicad_config::ConfigKind;
//! use kiauto_fixtures::TestContext;
//!
//! let mut ctx = TestContext::sch("Eeschema_config_bkp", "good-project", env!("CARGO_BIN_EXE_eeschema_do"));
//! ctx.create_config_backup(ConfigKind::Eeschema);
//! ctx.run(&["run_erc"], ExitCode::EeschemaCfgPresent.code());
//! assert!(ctx.search_err("Eeschema config back-up found").is_some());
//! ctx.clean_up();
//! ```

// Test fixtures crate - relaxed lints for test utilities
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]
#![allow(clippy::missing_panics_doc)]

pub mod context;
pub mod fake_tools;
pub mod helpers;

pub use context::{
    projects_dir, HarnessError, RunOptions, RunningCli, TestContext, HARNESS_SLACK, STOP_GRACE,
};
pub use fake_tools::{FakeTools, ENV_FAKE_REPORT, ENV_FAKE_WINDOW_ID, ENV_FAKE_XDO_LOG};
pub use helpers::{temp_dir, wait_until};
