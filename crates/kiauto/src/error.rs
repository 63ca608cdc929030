//! Error type shared by every operation.
//!
//! Each variant maps to exactly one [`ExitCode`] and renders as the single
//! diagnostic line the CLI prints. The wording of those lines is relied on
//! by scripts that grep KiAuto's stderr, so treat it as part of the
//! interface.

use crate::kicad_config::ConfigKind;
use crate::model::{ExitCode, Tool};
use miette::Diagnostic;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the crate.
pub type KiAutoResult<T> = Result<T, KiAutoError>;

/// Everything that can stop an operation short of a result.
#[derive(Debug, Error, Diagnostic)]
pub enum KiAutoError {
    /// The schematic is missing or not a regular file.
    #[error("{} does not exist", .0.display())]
    #[diagnostic(code(kiauto::no_schematic))]
    SchematicNotFound(PathBuf),

    /// The board is missing or not a regular file.
    #[error("{} does not exist", .0.display())]
    #[diagnostic(code(kiauto::no_pcb))]
    BoardNotFound(PathBuf),

    /// The input file has no extension.
    #[error("Input files must use an extension, otherwise KiCad will reject them.")]
    #[diagnostic(code(kiauto::wrong_name))]
    MissingExtension {
        /// Tool the file was meant for.
        tool: Tool,
        /// The rejected file.
        path: PathBuf,
    },

    /// The board does not end in `.kicad_pcb`.
    #[error("PCB files must use the .kicad_pcb extension ({})", .0.display())]
    #[diagnostic(code(kiauto::wrong_pcb_name))]
    WrongBoardExtension(PathBuf),

    /// A `.pre_script` back-up from an interrupted run is in the way.
    #[error("{} config back-up found ({})", .kind.label(), .path.display())]
    #[diagnostic(
        code(kiauto::config_backup),
        help("a previous run was interrupted; restore the back-up or remove it before retrying")
    )]
    ConfigBackupFound {
        /// Which configuration file.
        kind: ConfigKind,
        /// The back-up left behind.
        path: PathBuf,
    },

    /// A requested layer is neither standard nor declared in the board.
    #[error("Unknown layer {0}")]
    #[diagnostic(code(kiauto::wrong_layer_name))]
    UnknownLayer(String),

    /// The tool exited early or showed an error dialog.
    #[error("{tool} reported an error")]
    #[diagnostic(code(kiauto::tool_error))]
    ToolReported {
        /// The failing tool.
        tool: Tool,
        /// Last line the tool wrote, when there is one.
        #[help]
        detail: Option<String>,
    },

    /// The main window never showed up.
    #[error("{tool} window did not appear after {} s", .waited.as_secs())]
    #[diagnostic(code(kiauto::start_timeout))]
    StartTimeout {
        /// The tool that was started.
        tool: Tool,
        /// The startup bound that expired.
        waited: Duration,
    },

    /// The key script ran but the report or printout never appeared.
    #[error("{tool} did not produce {} within {} s", .path.display(), .waited.as_secs())]
    #[diagnostic(code(kiauto::artifact_timeout))]
    ArtifactTimeout {
        /// The tool that was driven.
        tool: Tool,
        /// The file that never appeared.
        path: PathBuf,
        /// How long it was waited for.
        waited: Duration,
    },

    /// An external program could not be started.
    #[error("{program} not found, is it installed?")]
    #[diagnostic(code(kiauto::missing_tool))]
    MissingTool {
        /// Program path or name as configured.
        program: String,
    },

    /// SIGINT, SIGTERM or SIGHUP arrived during the run.
    #[error("interrupted")]
    #[diagnostic(code(kiauto::interrupted))]
    Interrupted,

    /// Arguments that parse but make no sense together.
    #[error("{0}")]
    #[diagnostic(code(kiauto::wrong_arguments))]
    InvalidArguments(String),

    /// The settings file is unreadable or invalid.
    #[error("failed to load settings from {}: {reason}", .path.display())]
    #[diagnostic(code(kiauto::settings))]
    Settings {
        /// The settings file.
        path: PathBuf,
        /// Parser or I/O message.
        reason: String,
    },

    /// A report without the expected summary.
    #[error("malformed report {}: {reason}", .path.display())]
    #[diagnostic(code(kiauto::report))]
    Report {
        /// The report file.
        path: PathBuf,
        /// What was missing.
        reason: String,
    },

    /// Filesystem or process failure, with what was being done.
    #[error("{context}: {source}")]
    #[diagnostic(code(kiauto::io))]
    Io {
        /// The step that failed (`reading /x/y.erc`).
        context: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl KiAutoError {
    /// [`KiAutoError::Io`] with a short description of the failed step.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// [`KiAutoError::ToolReported`], optionally with the tool's last words.
    pub fn tool_reported(tool: Tool, detail: impl Into<Option<String>>) -> Self {
        Self::ToolReported {
            tool,
            detail: detail.into(),
        }
    }

    /// Registry code the process exits with for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::SchematicNotFound(_) => ExitCode::NoSchematic,
            Self::BoardNotFound(_) => ExitCode::NoPcb,
            Self::MissingExtension {
                tool: Tool::Eeschema,
                ..
            } => ExitCode::WrongSchName,
            Self::MissingExtension {
                tool: Tool::Pcbnew, ..
            }
            | Self::WrongBoardExtension(_) => ExitCode::WrongPcbName,
            Self::ConfigBackupFound { kind, .. } => kind.backup_exit_code(),
            Self::UnknownLayer(_) => ExitCode::WrongLayerName,
            Self::ToolReported { tool, .. } => tool.error_code(),
            Self::StartTimeout { .. } => ExitCode::StartTimeout,
            Self::MissingTool { .. } => ExitCode::MissingTool,
            Self::Interrupted => ExitCode::Interrupted,
            Self::InvalidArguments(_) | Self::Settings { .. } => ExitCode::WrongArguments,
            Self::ArtifactTimeout { .. } | Self::Report { .. } | Self::Io { .. } => {
                ExitCode::InternalError
            }
        }
    }
}
