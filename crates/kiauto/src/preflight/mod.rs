//! Input checks done before any KiCad process is started.

use crate::error::{KiAutoError, KiAutoResult};
use crate::model::Tool;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Extension pcbnew requires for boards.
pub const BOARD_EXTENSION: &str = "kicad_pcb";

/// The schematic must exist and carry an extension; eeschema refuses to load
/// a file without one.
pub fn check_schematic(path: &Path) -> KiAutoResult<()> {
    if !path.is_file() {
        return Err(KiAutoError::SchematicNotFound(path.to_path_buf()));
    }
    if path.extension().is_none() {
        return Err(KiAutoError::MissingExtension {
            tool: Tool::Eeschema,
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), "schematic accepted");
    Ok(())
}

/// The board must exist and use the `.kicad_pcb` extension.
pub fn check_board(path: &Path) -> KiAutoResult<()> {
    if !path.is_file() {
        return Err(KiAutoError::BoardNotFound(path.to_path_buf()));
    }
    match path.extension() {
        None => Err(KiAutoError::MissingExtension {
            tool: Tool::Pcbnew,
            path: path.to_path_buf(),
        }),
        Some(ext) if ext != BOARD_EXTENSION => {
            Err(KiAutoError::WrongBoardExtension(path.to_path_buf()))
        }
        Some(_) => {
            debug!(path = %path.display(), "board accepted");
            Ok(())
        }
    }
}

/// Validate the input file for `tool`.
pub fn check_input(tool: Tool, path: &Path) -> KiAutoResult<()> {
    match tool {
        Tool::Eeschema => check_schematic(path),
        Tool::Pcbnew => check_board(path),
    }
}

/// Create the output directory if it is missing.
pub fn ensure_output_dir(dir: &Path) -> KiAutoResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    debug!(path = %dir.display(), "creating output directory");
    fs::create_dir_all(dir)
        .map_err(|err| KiAutoError::io(format!("creating {}", dir.display()), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExitCode;

    #[test]
    fn missing_schematic() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_schematic(&dir.path().join("dummy")).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::NoSchematic);
        assert!(err.to_string().ends_with("dummy does not exist"));
    }

    #[test]
    fn directory_is_not_a_schematic() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_schematic(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::NoSchematic);
    }

    #[test]
    fn schematic_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Makefile");
        fs::write(&path, "all:\n").unwrap();
        let err = check_schematic(&path).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::WrongSchName);
    }

    #[test]
    fn schematic_with_any_extension_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.sch");
        fs::write(&path, "EESchema Schematic File Version 4\n").unwrap();
        check_schematic(&path).unwrap();
    }

    #[test]
    fn board_checks() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.kicad_pcb");
        assert_eq!(
            check_board(&missing).unwrap_err().exit_code(),
            ExitCode::NoPcb
        );

        let bare = dir.path().join("board");
        fs::write(&bare, "(kicad_pcb)").unwrap();
        assert_eq!(
            check_board(&bare).unwrap_err().exit_code(),
            ExitCode::WrongPcbName
        );

        let wrong = dir.path().join("board.brd");
        fs::write(&wrong, "(kicad_pcb)").unwrap();
        let err = check_board(&wrong).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::WrongPcbName);
        assert!(err.to_string().contains(".kicad_pcb"));

        let good = dir.path().join("board.kicad_pcb");
        fs::write(&good, "(kicad_pcb)").unwrap();
        check_board(&good).unwrap();
    }

    #[test]
    fn output_dir_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a").join("b");
        ensure_output_dir(&out).unwrap();
        ensure_output_dir(&out).unwrap();
        assert!(out.is_dir());
    }
}
