//! The two KiCad programs KiAuto drives.

use crate::model::ExitCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The KiCad program being automated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Schematic editor.
    Eeschema,
    /// Board editor.
    Pcbnew,
}

impl Tool {
    /// Executable name, also used in log messages.
    pub const fn program(self) -> &'static str {
        match self {
            Self::Eeschema => "eeschema",
            Self::Pcbnew => "pcbnew",
        }
    }

    /// Environment variable that overrides the executable path.
    pub const fn env_override(self) -> &'static str {
        match self {
            Self::Eeschema => "KIAUTO_EESCHEMA",
            Self::Pcbnew => "KIAUTO_PCBNEW",
        }
    }

    /// Title of the main window once a file is loaded.
    ///
    /// Extended regex as understood by `xdotool search --name`, which
    /// matches case-insensitively.
    pub const fn main_window_pattern(self) -> &'static str {
        match self {
            Self::Eeschema => r"eeschema.*\.(sch|kicad_sch)",
            Self::Pcbnew => r"pcbnew.*\.kicad_pcb",
        }
    }

    /// Exit code used when the tool itself reports a failure.
    pub const fn error_code(self) -> ExitCode {
        match self {
            Self::Eeschema => ExitCode::EeschemaError,
            Self::Pcbnew => ExitCode::PcbnewError,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}
