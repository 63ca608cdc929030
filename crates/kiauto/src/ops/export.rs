//! Printing board layers to PDF through pcbnew.

use super::{drive, prepare};
use crate::driver::{Automation, KeyStep};
use crate::error::{KiAutoError, KiAutoResult};
use crate::kicad_config::{KicadConfig, ToolSettings};
use crate::layers::LayerTable;
use crate::model::{Outcome, Tool};
use crate::preflight;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name used when `--output-name` is not given.
pub const DEFAULT_EXPORT_NAME: &str = "printed.pdf";

/// Highest layer id pcbnew knows about (`F.Fab`), KiCad 5 to 8 numbering.
const LAST_LAYER_ID: u32 = 49;

/// `pcbnew_do export`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportRequest {
    /// Board to print.
    pub board: PathBuf,
    /// Directory for the printout, created when missing.
    pub output_dir: PathBuf,
    /// Layer names, standard or as renamed in the board.
    pub layers: Vec<String>,
    /// File name of the printout inside `output_dir`.
    pub output_name: String,
}

/// pcbnew settings selecting exactly `ids` in the print dialog.
///
/// KiCad 5 reads one `PlotLayer_<id>` flag per layer; 5.99 and newer read
/// the id list under `printing.layers`.
pub fn print_layer_settings(ids: &[u32]) -> ToolSettings {
    let ini = (0..=LAST_LAYER_ID)
        .map(|id| {
            let on = if ids.contains(&id) { "1" } else { "0" };
            (format!("PlotLayer_{id}"), on.to_string())
        })
        .collect();
    let mut selected = ids.to_vec();
    selected.sort_unstable();
    selected.dedup();
    ToolSettings {
        ini,
        json: vec![(
            "printing".to_string(),
            "layers".to_string(),
            serde_json::Value::from(selected),
        )],
    }
}

/// File > Print, accept KiCad's dialog, then print to `target` from the
/// system dialog.
fn print_script(target: &Path) -> Vec<KeyStep> {
    vec![
        KeyStep::keys(&["ctrl+p"]),
        KeyStep::wait_window("^Print$"),
        KeyStep::keys(&["Return"]),
        KeyStep::wait_window("^Print$"),
        KeyStep::keys(&["alt+n"]),
        KeyStep::type_path(target),
        KeyStep::keys(&["Return"]),
    ]
}

/// Print the requested layers of a board to a file.
///
/// Layer names are checked against the board before anything else touches
/// the configuration.
pub fn export_layers(
    request: &ExportRequest,
    config: &KicadConfig,
    automation: &dyn Automation,
) -> KiAutoResult<Outcome> {
    preflight::check_board(&request.board)?;
    if request.layers.is_empty() {
        return Err(KiAutoError::InvalidArguments(
            "at least one layer is required".to_string(),
        ));
    }
    let contents = fs::read_to_string(&request.board).map_err(|err| {
        KiAutoError::io(format!("reading {}", request.board.display()), err)
    })?;
    let ids = LayerTable::for_board(&contents).resolve(request.layers.iter().map(String::as_str))?;
    debug!(?ids, "layers to print");

    let prepared = prepare(Tool::Pcbnew, &request.board, &request.output_dir, config)?;
    let target = prepared.output_dir.join(&request.output_name);
    info!(
        "Printing {} to {}",
        request.layers.join(", "),
        target.display()
    );
    drive(
        automation,
        config,
        &print_layer_settings(&ids),
        Tool::Pcbnew,
        &prepared,
        &target,
        print_script(&target),
    )?;
    Ok(Outcome {
        tool: Tool::Pcbnew,
        errors: 0,
        warnings: 0,
        failing: 0,
        artifact: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kicad_config::ConfigKind;
    use crate::model::{ExitCode, KicadVersion, KICAD_VERSION_DEFAULT};
    use crate::ops::testing::{CannedAutomation, BOARD};

    fn setup(layers: &[&str]) -> (tempfile::TempDir, ExportRequest, KicadConfig) {
        let dir = tempfile::tempdir().unwrap();
        let board = dir.path().join("good-project.kicad_pcb");
        fs::write(&board, BOARD).unwrap();
        let request = ExportRequest {
            board,
            output_dir: dir.path().join("out"),
            layers: layers.iter().map(|l| (*l).to_string()).collect(),
            output_name: DEFAULT_EXPORT_NAME.to_string(),
        };
        let config = KicadConfig::new(dir.path().join("kicad"), KICAD_VERSION_DEFAULT);
        (dir, request, config)
    }

    #[test]
    fn settings_select_only_requested_layers() {
        let settings = print_layer_settings(&[44, 0, 44]);
        assert_eq!(settings.ini.len(), 50);
        assert!(settings.ini.contains(&("PlotLayer_0".to_string(), "1".to_string())));
        assert!(settings.ini.contains(&("PlotLayer_44".to_string(), "1".to_string())));
        assert!(settings.ini.contains(&("PlotLayer_31".to_string(), "0".to_string())));
        assert_eq!(
            settings.json,
            vec![(
                "printing".to_string(),
                "layers".to_string(),
                serde_json::Value::from(vec![0, 44])
            )]
        );
    }

    #[test]
    fn prints_with_layers_selected_in_config() {
        let (_dir, request, config) = setup(&["F.Cu", "Edge.Cuts"]);
        let mut automation = CannedAutomation::writing("%PDF-1.4\n");
        automation.config_file = Some(config.file(ConfigKind::Pcbnew));
        let outcome = export_layers(&request, &config, &automation).unwrap();
        assert_eq!(outcome.exit_status(), 0);
        assert!(outcome.artifact.ends_with("printed.pdf"));
        assert!(outcome.artifact.is_file());

        let seen = automation.config_seen.borrow().clone().unwrap();
        assert!(seen.contains("PlotLayer_0=1"));
        assert!(seen.contains("PlotLayer_44=1"));
        assert!(seen.contains("PlotLayer_31=0"));
        // Nothing of ours is left behind.
        assert!(!config.file(ConfigKind::Pcbnew).exists());
    }

    #[test]
    fn json_config_receives_the_layer_list() {
        let (dir, request, _) = setup(&["Edge.Cuts"]);
        let config = KicadConfig::new(dir.path().join("kicad"), KicadVersion::new(6, 0, 0));
        fs::create_dir_all(config.dir()).unwrap();
        let user = r#"{"printing":{"layers":[0,31],"monochrome":true}}"#;
        fs::write(config.file(ConfigKind::Pcbnew), user).unwrap();
        let mut automation = CannedAutomation::writing("%PDF-1.4\n");
        automation.config_file = Some(config.file(ConfigKind::Pcbnew));

        export_layers(&request, &config, &automation).unwrap();

        let seen: serde_json::Value =
            serde_json::from_str(&automation.config_seen.borrow().clone().unwrap()).unwrap();
        assert_eq!(seen["printing"]["layers"], serde_json::Value::from(vec![44]));
        assert_eq!(seen["printing"]["monochrome"], serde_json::Value::Bool(true));
        assert_eq!(fs::read_to_string(config.file(ConfigKind::Pcbnew)).unwrap(), user);
    }

    #[test]
    fn unknown_layer_is_rejected_before_the_tool_runs() {
        let (_dir, request, config) = setup(&["F.Cu", "F.Bogus"]);
        let automation = CannedAutomation::writing("%PDF-1.4\n");
        let err = export_layers(&request, &config, &automation).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::WrongLayerName);
        assert_eq!(err.to_string(), "Unknown layer F.Bogus");
        assert!(automation.jobs.borrow().is_empty());
        assert!(!request.output_dir.exists());
    }

    #[test]
    fn missing_board_wins_over_bad_layers() {
        let (dir, mut request, config) = setup(&["F.Bogus"]);
        request.board = dir.path().join("nope.kicad_pcb");
        let err = export_layers(&request, &config, &CannedAutomation::writing("")).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::NoPcb);
    }
}
