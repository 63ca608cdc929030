//! Design rules check through pcbnew.

use super::{drive, prepare, report_path};
use crate::driver::{Automation, KeyStep};
use crate::error::KiAutoResult;
use crate::kicad_config::{KicadConfig, ToolSettings};
use crate::model::{Outcome, Tool};
use crate::report;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `pcbnew_do run_drc`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrcRequest {
    /// Board to check.
    pub board: PathBuf,
    /// Directory for the report, created when missing.
    pub output_dir: PathBuf,
    /// Do not count unconnected items as failures.
    pub ignore_unconnected: bool,
}

fn drc_script(report: &Path) -> Vec<KeyStep> {
    vec![
        KeyStep::keys(&["alt+i", "d"]),
        KeyStep::wait_window("DRC Control"),
        // Focus "Create report file", tick it, move to the file name.
        KeyStep::keys(&["Tab", "Tab", "Tab", "Tab", "Tab", "Tab", "space", "Tab"]),
        KeyStep::type_path(report),
        KeyStep::keys(&["Return"]),
    ]
}

/// Run the design rules check on a board.
pub fn run_drc(
    request: &DrcRequest,
    config: &KicadConfig,
    automation: &dyn Automation,
) -> KiAutoResult<Outcome> {
    let prepared = prepare(Tool::Pcbnew, &request.board, &request.output_dir, config)?;
    let report = report_path(&prepared, "rpt");
    info!("Running DRC on {}", prepared.input.display());
    drive(
        automation,
        config,
        &ToolSettings::default(),
        Tool::Pcbnew,
        &prepared,
        &report,
        drc_script(&report),
    )?;

    let summary = report::read_drc(&report)?;
    info!(
        "DRC: {} errors, {} unconnected ({})",
        summary.errors,
        summary.unconnected,
        report.display()
    );
    let unconnected = if request.ignore_unconnected {
        0
    } else {
        summary.unconnected
    };
    let failing = summary.errors.saturating_add(unconnected);
    if failing > 0 {
        warn!("{} DRC errors, {} unconnected", summary.errors, unconnected);
    }
    Ok(Outcome {
        tool: Tool::Pcbnew,
        errors: summary.errors,
        warnings: summary.unconnected,
        failing,
        artifact: report,
    })
}
