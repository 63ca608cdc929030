//! Run settings: tool locations, timeouts and recording geometry.
//!
//! Precedence, lowest first: built-in defaults, a YAML settings file,
//! `KIAUTO_*` environment variables, command line flags (applied by the
//! CLI).

use crate::error::{KiAutoError, KiAutoResult};
use crate::model::{CaptureGeometry, KicadVersion, Tool, KICAD_VERSION_DEFAULT, WAIT_START};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

/// Environment override for the `xdotool` executable.
pub const ENV_XDOTOOL: &str = "KIAUTO_XDOTOOL";
/// Environment override for the `ffmpeg` executable.
pub const ENV_FFMPEG: &str = "KIAUTO_FFMPEG";
/// Environment override for the KiCad version, skips detection.
pub const ENV_KICAD_VERSION: &str = "KIAUTO_KICAD_VERSION";

/// How a run finds and drives its tools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// eeschema executable; `eeschema` from `PATH` when unset.
    pub eeschema: Option<PathBuf>,
    /// pcbnew executable; `pcbnew` from `PATH` when unset.
    pub pcbnew: Option<PathBuf>,
    /// xdotool executable.
    pub xdotool: PathBuf,
    /// ffmpeg executable, only used when recording.
    pub ffmpeg: PathBuf,
    /// Startup wait bound for the tool's main window, in seconds.
    pub wait_start_secs: u64,
    /// How long to wait for a report or export after the key script ran.
    pub artifact_timeout_secs: u64,
    /// Delay between typed characters, in milliseconds.
    pub key_delay_ms: u64,
    /// Recorded screen area.
    pub capture: CaptureGeometry,
    /// Overrides KiCad's configuration root discovery.
    pub kicad_config_home: Option<PathBuf>,
    /// KiCad version (`5.1.9`); detected when unset.
    pub kicad_version: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            eeschema: None,
            pcbnew: None,
            xdotool: PathBuf::from("xdotool"),
            ffmpeg: PathBuf::from("ffmpeg"),
            wait_start_secs: WAIT_START.as_secs(),
            artifact_timeout_secs: 60,
            key_delay_ms: 50,
            capture: CaptureGeometry::default(),
            kicad_config_home: None,
            kicad_version: None,
        }
    }
}

impl Settings {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    /// Load a YAML settings file, then apply environment overrides.
    pub fn load(path: &Path) -> KiAutoResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|err| KiAutoError::Settings {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let mut settings: Settings =
            serde_yml::from_str(&data).map_err(|err| KiAutoError::Settings {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply `KIAUTO_*` and `KICAD_CONFIG_HOME` overrides from `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.is_empty());
        if let Some(path) = non_empty(Tool::Eeschema.env_override()) {
            self.eeschema = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty(Tool::Pcbnew.env_override()) {
            self.pcbnew = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty(ENV_XDOTOOL) {
            self.xdotool = PathBuf::from(path);
        }
        if let Some(path) = non_empty(ENV_FFMPEG) {
            self.ffmpeg = PathBuf::from(path);
        }
        if let Some(version) = non_empty(ENV_KICAD_VERSION) {
            self.kicad_version = Some(version);
        }
        if let Some(dir) = non_empty(crate::kicad_config::KICAD_CONFIG_HOME) {
            self.kicad_config_home = Some(PathBuf::from(dir));
        }
    }

    /// Executable for `tool`.
    pub fn tool_path(&self, tool: Tool) -> PathBuf {
        let configured = match tool {
            Tool::Eeschema => self.eeschema.as_ref(),
            Tool::Pcbnew => self.pcbnew.as_ref(),
        };
        configured
            .cloned()
            .unwrap_or_else(|| PathBuf::from(tool.program()))
    }

    /// Startup wait bound.
    pub fn wait_start(&self) -> Duration {
        Duration::from_secs(self.wait_start_secs)
    }

    /// Artifact wait bound.
    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_secs(self.artifact_timeout_secs)
    }

    /// Delay between keystrokes.
    pub fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }

    /// KiCad version to target.
    ///
    /// Uses the configured version when present, otherwise asks
    /// `kicad-cli version` (KiCad 7+), otherwise assumes KiCad 5.1.
    pub fn kicad_version(&self) -> KiAutoResult<KicadVersion> {
        if let Some(text) = &self.kicad_version {
            return KicadVersion::parse(text).ok_or_else(|| {
                KiAutoError::InvalidArguments(format!("malformed KiCad version '{text}'"))
            });
        }
        let detected = detect_kicad_cli_version();
        debug!(?detected, "KiCad version detection");
        Ok(detected.unwrap_or(KICAD_VERSION_DEFAULT))
    }
}

fn detect_kicad_cli_version() -> Option<KicadVersion> {
    let output = Command::new("kicad-cli")
        .arg("version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    KicadVersion::parse(&String::from_utf8_lossy(&output.stdout))
}
