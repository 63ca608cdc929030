//! eeschema_do failure paths: config back-ups, bad inputs, bad commands.
// Test module - relaxed lint rules
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use kiauto::kicad_config::ConfigKind;
use kiauto::{ExitCode, KICAD_VERSION_5_99};
use kiauto_fixtures::{RunOptions, TestContext};
use std::fs;

const PROJECT: &str = "good-project";
const BOGUS_SCH: &str = "bogus.sch";

fn context(name: &str) -> TestContext {
    TestContext::sch(name, PROJECT, env!("CARGO_BIN_EXE_eeschema_do"))
}

#[test]
fn eeschema_config_backup() {
    let mut ctx = context("Eeschema_config_bkp");
    let backup = ctx.create_config_backup(ConfigKind::Eeschema);
    ctx.run(&["run_erc"], ExitCode::EeschemaCfgPresent.code());
    assert!(ctx.search_err("Eeschema config back-up found").is_some());
    // Reported, never removed.
    assert_eq!(fs::read_to_string(&backup).unwrap(), "Dummy back-up\n");
    fs::remove_file(&backup).unwrap();
    ctx.clean_up();
}

#[test]
fn kicad_common_config_backup() {
    let mut ctx = context("Eeschema_common_config_bkp");
    let backup = ctx.create_config_backup(ConfigKind::KicadCommon);
    ctx.run(&["run_erc"], ExitCode::KicadCfgPresent.code());
    assert!(ctx.search_err("KiCad common config back-up found").is_some());
    fs::remove_file(&backup).unwrap();
    ctx.clean_up();
}

#[test]
fn sch_not_found() {
    let mut ctx = context("Schematic_not_found");
    ctx.run_with(
        &["run_erc"],
        ExitCode::NoSchematic.code(),
        &RunOptions::filename("dummy"),
    );
    assert!(ctx.search_err(r"ERROR:.* does not exist").is_some());
    ctx.clean_up();
}

#[test]
fn sch_no_extension() {
    let mut ctx = context("SCH_no_extension");
    ctx.run_with(
        &["run_erc"],
        ExitCode::WrongSchName.code(),
        &RunOptions::filename("Makefile"),
    );
    assert!(ctx
        .search_err(r"Input files must use an extension")
        .is_some());
    ctx.clean_up();
}

#[test]
fn bogus_sch() {
    let mut ctx = context("Bogus_SCH");
    // KiCad 5.99+ opens the load warning without focus, so the failure is
    // only visible on 5.x.
    if ctx.kicad_version < KICAD_VERSION_5_99 {
        let sch = ctx.get_out_path(BOGUS_SCH);
        fs::write(&sch, "dummy").unwrap();
        ctx.run_with(
            &["-vv", "-r", "run_erc"],
            ExitCode::EeschemaError.code(),
            &RunOptions::filename(&sch),
        );
        assert!(ctx.search_err(r"eeschema reported an error").is_some());
        assert!(ctx.search_err(r"^DEBUG:").is_some());
    }
    ctx.clean_up();
}

#[test]
fn sch_wrong_command() {
    let mut ctx = context("SCH_Wrong_Command");
    ctx.run(&["bogus"], ExitCode::WrongArguments.code());
    // Nothing beyond argument parsing happened.
    assert_eq!(fs::read_dir(&ctx.output_dir).unwrap().count(), 0);
    assert!(!ctx.kicad_cfg_dir.exists());
    ctx.clean_up();
}

#[test]
fn clean_up_twice_is_harmless() {
    let mut ctx = context("SCH_double_clean_up");
    ctx.run(&["bogus"], ExitCode::WrongArguments.code());
    ctx.clean_up();
    ctx.clean_up();
    assert!(!ctx.root.exists());
}

#[test]
fn config_dir_is_left_as_found() {
    let mut ctx = context("SCH_config_restored");
    let eeschema_cfg = ctx.config_file(ConfigKind::Eeschema);
    fs::create_dir_all(eeschema_cfg.parent().unwrap()).unwrap();
    fs::write(&eeschema_cfg, "LibDir=/mine\n").unwrap();
    let sch = ctx.write_project_file(BOGUS_SCH, "dummy");
    ctx.run_with(
        &["run_erc"],
        ExitCode::EeschemaError.code(),
        &RunOptions::filename(sch),
    );
    assert_eq!(fs::read_to_string(&eeschema_cfg).unwrap(), "LibDir=/mine\n");
    let mut backup = eeschema_cfg.into_os_string();
    backup.push(".pre_script");
    assert!(!std::path::Path::new(&backup).exists());
    assert!(!ctx.config_file(ConfigKind::KicadCommon).exists());
    ctx.clean_up();
}
