//! The operations behind `eeschema_do` and `pcbnew_do`.
//!
//! Each operation runs the same pipeline: validate the input, create the
//! output directory, refuse to run over a stale configuration back-up, swap
//! in an unattended configuration, hand the tool to the [`Automation`] and
//! read back what it produced. The configuration is restored before the
//! report is parsed, whatever the automation returned.

mod drc;
mod erc;
mod export;

pub use drc::{run_drc, DrcRequest};
pub use erc::{run_erc, ErcRequest};
pub use export::{export_layers, print_layer_settings, ExportRequest, DEFAULT_EXPORT_NAME};

use crate::driver::{Automation, Job, KeyStep};
use crate::error::{KiAutoError, KiAutoResult};
use crate::kicad_config::{KicadConfig, ToolSettings};
use crate::model::Tool;
use crate::preflight;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inputs and outputs resolved to absolute paths, ready for the tool.
#[derive(Debug)]
struct Prepared {
    input: PathBuf,
    output_dir: PathBuf,
}

/// Shared checks, in the order their exit codes take precedence.
fn prepare(
    tool: Tool,
    input: &Path,
    output_dir: &Path,
    config: &KicadConfig,
) -> KiAutoResult<Prepared> {
    preflight::check_input(tool, input)?;
    preflight::ensure_output_dir(output_dir)?;
    config.check_backups(tool)?;
    Ok(Prepared {
        input: absolute(input)?,
        output_dir: absolute(output_dir)?,
    })
}

fn absolute(path: &Path) -> KiAutoResult<PathBuf> {
    fs::canonicalize(path)
        .map_err(|err| KiAutoError::io(format!("resolving {}", path.display()), err))
}

/// `<output_dir>/<input stem>.<extension>`
fn report_path(prepared: &Prepared, extension: &str) -> PathBuf {
    let stem = prepared
        .input
        .file_stem()
        .map_or_else(|| "report".into(), |s| s.to_string_lossy().into_owned());
    prepared.output_dir.join(format!("{stem}.{extension}"))
}

/// Remove an artifact left by an earlier run so it cannot be mistaken for
/// this run's output.
fn remove_stale(path: &Path) -> KiAutoResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale artifact");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(KiAutoError::io(format!("removing {}", path.display()), err)),
    }
}

/// Run `script` with the configuration taken over, restoring it after.
fn drive(
    automation: &dyn Automation,
    config: &KicadConfig,
    extra_config: &ToolSettings,
    tool: Tool,
    prepared: &Prepared,
    artifact: &Path,
    script: Vec<KeyStep>,
) -> KiAutoResult<()> {
    remove_stale(artifact)?;
    let guard = config.take_over_with(tool, extra_config)?;
    let job = Job {
        tool,
        input: prepared.input.clone(),
        output_dir: prepared.output_dir.clone(),
        artifact: artifact.to_path_buf(),
        script,
    };
    let ran = automation.run(&job);
    let restored = guard.restore();
    ran?;
    restored
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Writes a canned artifact instead of driving a GUI.
    pub struct CannedAutomation {
        pub artifact: Option<String>,
        pub failure: Option<fn(Tool) -> KiAutoError>,
        pub jobs: RefCell<Vec<Job>>,
        /// Snapshot of the tool's config file taken while the job ran.
        pub config_seen: RefCell<Option<String>>,
        pub config_file: Option<PathBuf>,
    }

    impl CannedAutomation {
        pub fn writing(contents: &str) -> Self {
            Self {
                artifact: Some(contents.to_string()),
                failure: None,
                jobs: RefCell::new(Vec::new()),
                config_seen: RefCell::new(None),
                config_file: None,
            }
        }

        pub fn failing(failure: fn(Tool) -> KiAutoError) -> Self {
            Self {
                artifact: None,
                failure: Some(failure),
                jobs: RefCell::new(Vec::new()),
                config_seen: RefCell::new(None),
                config_file: None,
            }
        }
    }

    impl Automation for CannedAutomation {
        fn run(&self, job: &Job) -> KiAutoResult<()> {
            self.jobs.borrow_mut().push(job.clone());
            if let Some(file) = &self.config_file {
                *self.config_seen.borrow_mut() = fs::read_to_string(file).ok();
            }
            if let Some(failure) = self.failure {
                return Err(failure(job.tool));
            }
            if let Some(contents) = &self.artifact {
                fs::write(&job.artifact, contents).unwrap();
            }
            Ok(())
        }
    }

    pub const SCHEMATIC: &str = "EESchema Schematic File Version 4\nEELAYER 30 0\nEELAYER END\n$EndSCHEMATC\n";

    pub const BOARD: &str = "(kicad_pcb (version 20171130) (host pcbnew 5.1.9)
  (layers
    (0 F.Cu signal)
    (31 B.Cu signal)
    (37 F.SilkS user)
    (44 Edge.Cuts user)
  )
)
";
}
