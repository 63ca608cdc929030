//! The exit status contract of `eeschema_do` and `pcbnew_do`.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// How long to wait for the eeschema/pcbnew main window to show up.
pub const WAIT_START: Duration = Duration::from_secs(25);

/// Highest exit status reserved for [`ExitCode`] members.
///
/// Registry codes are allocated from `1..=REGISTRY_MAX`. Everything above is
/// the violation namespace, see [`violation_exit_code`].
pub const REGISTRY_MAX: i32 = 31;

/// Largest violation count that can be told apart in an exit status.
///
/// Counts are reported as `256 - count`, so the namespace spans
/// `REGISTRY_MAX + 1..=255`. Larger counts saturate.
pub const MAX_REPORTED_VIOLATIONS: u32 = 224;

/// Why a KiAuto command terminated.
///
/// The integer values are part of the public contract: scripts branch on
/// them, so a value is never reused or renumbered. New members take the
/// next free value at or below [`REGISTRY_MAX`].
///
/// A successful run that found ERC/DRC violations does not use this table.
/// It exits with [`violation_exit_code`] instead, which lives in the top of
/// the byte range. Use [`classify`] to read an exit status back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum ExitCode {
    /// The schematic file does not exist.
    NoSchematic = 1,
    /// A previous run left an eeschema config back-up behind.
    EeschemaCfgPresent = 2,
    /// A previous run left a kicad_common config back-up behind.
    KicadCfgPresent = 3,
    /// The board file does not exist.
    NoPcb = 4,
    /// A previous run left a pcbnew config back-up behind.
    PcbnewCfgPresent = 5,
    /// A requested layer is not defined for the board.
    WrongLayerName = 6,
    /// The board file does not use the `.kicad_pcb` extension.
    WrongPcbName = 7,
    /// The schematic file has no extension.
    WrongSchName = 8,
    /// pcbnew reported an error while loading or processing the board.
    PcbnewError = 9,
    /// eeschema reported an error while loading or processing the schematic.
    EeschemaError = 10,
    /// The command line could not be parsed.
    WrongArguments = 11,
    /// The tool window did not appear within the startup wait bound.
    StartTimeout = 12,
    /// A required external program is not installed.
    MissingTool = 13,
    /// The run was interrupted by a signal.
    Interrupted = 14,
    /// Any failure not covered by a more specific code.
    InternalError = 15,
}

impl ExitCode {
    /// Every registry member, in numeric order.
    pub const ALL: [ExitCode; 15] = [
        Self::NoSchematic,
        Self::EeschemaCfgPresent,
        Self::KicadCfgPresent,
        Self::NoPcb,
        Self::PcbnewCfgPresent,
        Self::WrongLayerName,
        Self::WrongPcbName,
        Self::WrongSchName,
        Self::PcbnewError,
        Self::EeschemaError,
        Self::WrongArguments,
        Self::StartTimeout,
        Self::MissingTool,
        Self::Interrupted,
        Self::InternalError,
    ];

    /// Process exit status for this condition.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Symbolic name, as used in scripts and documentation.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoSchematic => "NO_SCHEMATIC",
            Self::EeschemaCfgPresent => "EESCHEMA_CFG_PRESENT",
            Self::KicadCfgPresent => "KICAD_CFG_PRESENT",
            Self::NoPcb => "NO_PCB",
            Self::PcbnewCfgPresent => "PCBNEW_CFG_PRESENT",
            Self::WrongLayerName => "WRONG_LAYER_NAME",
            Self::WrongPcbName => "WRONG_PCB_NAME",
            Self::WrongSchName => "WRONG_SCH_NAME",
            Self::PcbnewError => "PCBNEW_ERROR",
            Self::EeschemaError => "EESCHEMA_ERROR",
            Self::WrongArguments => "WRONG_ARGUMENTS",
            Self::StartTimeout => "START_TIMEOUT",
            Self::MissingTool => "MISSING_TOOL",
            Self::Interrupted => "INTERRUPTED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// One-line human description.
    pub const fn description(self) -> &'static str {
        match self {
            Self::NoSchematic => "Schematic file not found.",
            Self::EeschemaCfgPresent => {
                "Eeschema config back-up from an interrupted run; restore or remove it."
            }
            Self::KicadCfgPresent => {
                "KiCad common config back-up from an interrupted run; restore or remove it."
            }
            Self::NoPcb => "PCB file not found.",
            Self::PcbnewCfgPresent => {
                "Pcbnew config back-up from an interrupted run; restore or remove it."
            }
            Self::WrongLayerName => "Unknown layer name.",
            Self::WrongPcbName => "PCB file name without the .kicad_pcb extension.",
            Self::WrongSchName => "Schematic file name without extension.",
            Self::PcbnewError => "Pcbnew reported an error.",
            Self::EeschemaError => "Eeschema reported an error.",
            Self::WrongArguments => "Invalid command line arguments.",
            Self::StartTimeout => "The KiCad window did not appear in time.",
            Self::MissingTool => "A required program is not installed.",
            Self::Interrupted => "Interrupted by a signal.",
            Self::InternalError => "Unexpected failure.",
        }
    }

    /// Look up the registry member for an exit status.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Exit status for a run that completed and found `count` violations.
///
/// Zero violations is plain success. Counts above
/// [`MAX_REPORTED_VIOLATIONS`] saturate at the lowest violation code.
pub fn violation_exit_code(count: u32) -> i32 {
    if count == 0 {
        return 0;
    }
    let count = count.min(MAX_REPORTED_VIOLATIONS);
    // count <= 224, fits i32
    #[allow(clippy::cast_possible_wrap)]
    let count = count as i32;
    256 - count
}

/// Meaning of an observed process exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitClass {
    /// Exit status 0.
    Success,
    /// A registry error.
    Registry(ExitCode),
    /// Completed run with this many violations (possibly saturated).
    Violations(u32),
    /// Neither: a crash, a signal or a foreign code in the registry range.
    Unknown(i32),
}

/// Read an exit status back into its category.
pub fn classify(code: i32) -> ExitClass {
    match code {
        0 => ExitClass::Success,
        1..=REGISTRY_MAX => {
            ExitCode::from_code(code).map_or(ExitClass::Unknown(code), ExitClass::Registry)
        }
        c if c > REGISTRY_MAX && c <= 255 => {
            // 32..=255 maps to 224..=1
            #[allow(clippy::cast_sign_loss)]
            let count = (256 - c) as u32;
            ExitClass::Violations(count)
        }
        other => ExitClass::Unknown(other),
    }
}
