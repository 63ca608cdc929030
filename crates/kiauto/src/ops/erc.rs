//! Electrical rules check through eeschema.

use super::{drive, prepare, report_path};
use crate::driver::{Automation, KeyStep};
use crate::error::KiAutoResult;
use crate::kicad_config::{KicadConfig, ToolSettings};
use crate::model::{Outcome, Tool};
use crate::report;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `eeschema_do run_erc`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErcRequest {
    /// Schematic to check.
    pub schematic: PathBuf,
    /// Directory for the report, created when missing.
    pub output_dir: PathBuf,
    /// Count warnings as failures when there are no errors.
    pub warnings_as_errors: bool,
}

/// Inspect > Electrical Rules Checker, tick "create report", run, and save
/// the report under `report`.
fn erc_script(report: &Path) -> Vec<KeyStep> {
    vec![
        KeyStep::keys(&["alt+i", "e"]),
        KeyStep::wait_window("Electrical Rules Checker"),
        KeyStep::keys(&["Tab", "Tab", "Tab", "Tab", "space", "Return"]),
        KeyStep::wait_window("ERC File"),
        KeyStep::type_path(report),
        KeyStep::keys(&["Return"]),
    ]
}

/// Run the electrical rules check on a schematic.
///
/// The outcome's `failing` count is the number of errors, or the number of
/// warnings when there are no errors and `warnings_as_errors` is set.
pub fn run_erc(
    request: &ErcRequest,
    config: &KicadConfig,
    automation: &dyn Automation,
) -> KiAutoResult<Outcome> {
    let prepared = prepare(Tool::Eeschema, &request.schematic, &request.output_dir, config)?;
    let report = report_path(&prepared, "erc");
    info!("Running ERC on {}", prepared.input.display());
    drive(
        automation,
        config,
        &ToolSettings::default(),
        Tool::Eeschema,
        &prepared,
        &report,
        erc_script(&report),
    )?;

    let summary = report::read_erc(&report)?;
    info!(
        "ERC: {} errors, {} warnings ({})",
        summary.errors,
        summary.warnings,
        report.display()
    );
    let failing = if summary.errors > 0 {
        warn!("{} ERC errors", summary.errors);
        summary.errors
    } else if request.warnings_as_errors && summary.warnings > 0 {
        warn!("{} ERC warnings, treated as errors", summary.warnings);
        summary.warnings
    } else {
        0
    };
    Ok(Outcome {
        tool: Tool::Eeschema,
        errors: summary.errors,
        warnings: summary.warnings,
        failing,
        artifact: report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KiAutoError;
    use crate::kicad_config::ConfigKind;
    use crate::model::{ExitCode, KICAD_VERSION_DEFAULT};
    use crate::ops::testing::{CannedAutomation, SCHEMATIC};
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        schematic: PathBuf,
        out: PathBuf,
        config: KicadConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let schematic = dir.path().join("good-project.sch");
        fs::write(&schematic, SCHEMATIC).unwrap();
        let config = KicadConfig::new(dir.path().join("kicad"), KICAD_VERSION_DEFAULT);
        Fixture {
            out: dir.path().join("out"),
            schematic,
            config,
            _dir: dir,
        }
    }

    fn request(f: &Fixture, warnings_as_errors: bool) -> ErcRequest {
        ErcRequest {
            schematic: f.schematic.clone(),
            output_dir: f.out.clone(),
            warnings_as_errors,
        }
    }

    const ONE_WARNING: &str = " ** ERC messages: 1  Errors 0  Warnings 1\n";

    #[test]
    fn clean_schematic_passes() {
        let f = fixture();
        let automation = CannedAutomation::writing(" ** ERC messages: 0  Errors 0  Warnings 0\n");
        let outcome = run_erc(&request(&f, false), &f.config, &automation).unwrap();
        assert_eq!(outcome.exit_status(), 0);
        assert!(outcome.artifact.ends_with("good-project.erc"));

        let jobs = automation.jobs.borrow();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].tool, Tool::Eeschema);
        assert!(jobs[0].input.is_absolute());
        assert!(jobs[0]
            .script
            .contains(&KeyStep::type_path(&outcome.artifact)));
    }

    #[test]
    fn errors_become_violation_exit_code() {
        let f = fixture();
        let automation = CannedAutomation::writing(" ** ERC messages: 5  Errors 3  Warnings 2\n");
        let outcome = run_erc(&request(&f, true), &f.config, &automation).unwrap();
        assert_eq!(outcome.failing, 3);
        assert_eq!(outcome.exit_status(), 253);
    }

    #[test]
    fn warnings_only_fail_when_requested() {
        let f = fixture();
        let outcome = run_erc(
            &request(&f, false),
            &f.config,
            &CannedAutomation::writing(ONE_WARNING),
        )
        .unwrap();
        assert_eq!(outcome.exit_status(), 0);
        let outcome = run_erc(
            &request(&f, true),
            &f.config,
            &CannedAutomation::writing(ONE_WARNING),
        )
        .unwrap();
        assert_eq!(outcome.exit_status(), 255);
    }

    #[test]
    fn backup_stops_before_the_tool_runs() {
        let f = fixture();
        fs::create_dir_all(f.config.dir()).unwrap();
        fs::write(f.config.backup(ConfigKind::Eeschema), "x").unwrap();
        let automation = CannedAutomation::writing(ONE_WARNING);
        let err = run_erc(&request(&f, false), &f.config, &automation).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::EeschemaCfgPresent);
        assert!(automation.jobs.borrow().is_empty());
        assert!(f.config.backup(ConfigKind::Eeschema).exists());
    }

    #[test]
    fn config_is_restored_when_the_tool_fails() {
        let f = fixture();
        fs::create_dir_all(f.config.dir()).unwrap();
        fs::write(f.config.file(ConfigKind::Eeschema), "LibDir=/mine\n").unwrap();
        let mut automation = CannedAutomation::failing(|tool| KiAutoError::tool_reported(tool, None));
        automation.config_file = Some(f.config.file(ConfigKind::Eeschema));

        let err = run_erc(&request(&f, false), &f.config, &automation).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::EeschemaError);
        let seen = automation.config_seen.borrow().clone().unwrap();
        assert!(seen.contains("ShowIllegalSymbolLibDialog=0"));
        assert_eq!(
            fs::read_to_string(f.config.file(ConfigKind::Eeschema)).unwrap(),
            "LibDir=/mine\n"
        );
        assert!(!f.config.backup(ConfigKind::Eeschema).exists());
    }

    #[test]
    fn stale_report_is_not_reused() {
        let f = fixture();
        fs::create_dir_all(&f.out).unwrap();
        fs::write(f.out.join("good-project.erc"), ONE_WARNING).unwrap();
        let automation = CannedAutomation::failing(|tool| KiAutoError::StartTimeout {
            tool,
            waited: std::time::Duration::from_secs(1),
        });
        let err = run_erc(&request(&f, true), &f.config, &automation).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::StartTimeout);
        assert!(!f.out.join("good-project.erc").exists());
    }
}
