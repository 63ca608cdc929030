//! KiAuto: batch automation for KiCad's schematic and board editors.
//!
//! KiCad 5 only exposes electrical and design rule checks through its GUI.
//! This crate wraps the work around that GUI so a CI job can run the checks
//! unattended: it validates inputs, guards the user's KiCad configuration,
//! hands the tool over to an automation collaborator, parses the reports the
//! tool writes and turns everything into a stable process exit code.
//!
//! The exit-code contract lives in [`model::exit_code`]; the operations in
//! [`ops`].

#![forbid(unsafe_code)]

pub mod driver;
pub mod error;
pub mod kicad_config;
pub mod layers;
pub mod model;
pub mod ops;
pub mod preflight;
pub mod report;
pub mod settings;

pub use crate::error::{KiAutoError, KiAutoResult};
pub use crate::model::*;
pub use crate::settings::Settings;
