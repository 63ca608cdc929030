//! KiCad configuration files touched during a run.
//!
//! Before driving a tool KiAuto moves the user's configuration aside
//! (`<name>.pre_script`), writes a copy tuned for unattended use and puts
//! the original back when the run ends. A `.pre_script` file that already
//! exists therefore means an earlier run died half-way: the user's real
//! settings may be in the back-up, so the run stops and asks for a human
//! instead of touching anything.

use crate::error::{KiAutoError, KiAutoResult};
use crate::model::{ExitCode, KicadVersion, Tool};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix appended to a configuration file while a run owns it.
pub const BACKUP_SUFFIX: &str = ".pre_script";

/// Environment variable KiCad itself honours for its configuration root.
pub const KICAD_CONFIG_HOME: &str = "KICAD_CONFIG_HOME";

/// A KiCad configuration file KiAuto may replace during a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    /// Schematic editor settings.
    Eeschema,
    /// Board editor settings.
    Pcbnew,
    /// Settings shared by every KiCad program.
    KicadCommon,
}

impl ConfigKind {
    /// Name used in diagnostics ("Eeschema config back-up found").
    pub const fn label(self) -> &'static str {
        match self {
            Self::Eeschema => "Eeschema",
            Self::Pcbnew => "PcbNew",
            Self::KicadCommon => "KiCad common",
        }
    }

    /// Base file name, without the `.json` used by 5.99+.
    pub const fn file_stem(self) -> &'static str {
        match self {
            Self::Eeschema => "eeschema",
            Self::Pcbnew => "pcbnew",
            Self::KicadCommon => "kicad_common",
        }
    }

    /// Exit code for a stale back-up of this file.
    pub const fn backup_exit_code(self) -> ExitCode {
        match self {
            Self::Eeschema => ExitCode::EeschemaCfgPresent,
            Self::Pcbnew => ExitCode::PcbnewCfgPresent,
            Self::KicadCommon => ExitCode::KicadCfgPresent,
        }
    }

    /// Files a tool reads, in the order their back-ups are checked.
    pub const fn for_tool(tool: Tool) -> [ConfigKind; 2] {
        match tool {
            Tool::Eeschema => [Self::Eeschema, Self::KicadCommon],
            Tool::Pcbnew => [Self::Pcbnew, Self::KicadCommon],
        }
    }

    /// Settings that keep the tool from opening dialogs nobody will answer.
    fn unattended_overrides(self, json: bool) -> &'static [(&'static str, &'static str)] {
        if json {
            return &[];
        }
        match self {
            Self::Eeschema => &[
                ("ShowIllegalSymbolLibDialog", "0"),
                ("ShowSheetFileNameCaseSensitivityDlg", "0"),
            ],
            Self::Pcbnew => &[("ShowPcbnewLegacyFileWarning", "0")],
            Self::KicadCommon => &[("ShowEnvVarWarningDialog", "0")],
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// Settings a run adds to the tool's own configuration file.
///
/// KiCad 5 keeps flat `key=value` files while 5.99 and newer keep one JSON
/// object per section, so each layout gets its own form. Only the form
/// matching the configuration in use is applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolSettings {
    /// `key=value` lines for the KiCad 5 layout.
    pub ini: Vec<(String, String)>,
    /// `(section, key, value)` entries for the JSON layout.
    pub json: Vec<(String, String, Value)>,
}

/// Location of KiCad's configuration for one KiCad version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KicadConfig {
    dir: PathBuf,
    json: bool,
}

impl KicadConfig {
    /// Configuration rooted at `root` for the given KiCad version.
    pub fn new(root: impl Into<PathBuf>, version: KicadVersion) -> Self {
        let root = root.into();
        if version.uses_json_config() {
            Self {
                dir: root.join(version.config_dir_name()),
                json: true,
            }
        } else {
            Self {
                dir: root,
                json: false,
            }
        }
    }

    /// Resolve the root the same way KiCad does: `KICAD_CONFIG_HOME`, then
    /// `$XDG_CONFIG_HOME/kicad`, then `$HOME/.config/kicad`.
    pub fn discover(version: KicadVersion) -> KiAutoResult<Self> {
        let root = default_root(|key| std::env::var_os(key).map(PathBuf::from))?;
        Ok(Self::new(root, version))
    }

    /// Directory holding the configuration files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the configuration file for `kind`.
    pub fn file(&self, kind: ConfigKind) -> PathBuf {
        if self.json {
            self.dir.join(format!("{}.json", kind.file_stem()))
        } else {
            self.dir.join(kind.file_stem())
        }
    }

    /// Path of the back-up a run would leave for `kind`.
    pub fn backup(&self, kind: ConfigKind) -> PathBuf {
        let mut name = self.file(kind).into_os_string();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    /// Fail if any file `tool` uses has a stale back-up.
    ///
    /// Back-ups are reported, never removed.
    pub fn check_backups(&self, tool: Tool) -> KiAutoResult<()> {
        for kind in ConfigKind::for_tool(tool) {
            let backup = self.backup(kind);
            debug!(path = %backup.display(), "checking for {kind} config back-up");
            if backup.exists() {
                return Err(KiAutoError::ConfigBackupFound { kind, path: backup });
            }
        }
        Ok(())
    }

    /// Whether this is the 5.99+ JSON layout.
    pub fn uses_json(&self) -> bool {
        self.json
    }

    /// Swap in unattended configurations for every file `tool` uses.
    ///
    /// Call [`check_backups`](Self::check_backups) first; the guard refuses
    /// to overwrite an existing back-up.
    pub fn take_over(&self, tool: Tool) -> KiAutoResult<ConfigGuard> {
        self.take_over_with(tool, &ToolSettings::default())
    }

    /// Like [`take_over`](Self::take_over), also applying `extra` to the
    /// tool's own file (print layer selection, for instance).
    pub fn take_over_with(&self, tool: Tool, extra: &ToolSettings) -> KiAutoResult<ConfigGuard> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            KiAutoError::io(format!("creating {}", self.dir.display()), err)
        })?;
        let mut guard = ConfigGuard {
            entries: Vec::new(),
        };
        let none = ToolSettings::default();
        for kind in ConfigKind::for_tool(tool) {
            let own = if kind == ConfigKind::KicadCommon { &none } else { extra };
            let mut overrides: Vec<(String, String)> = kind
                .unattended_overrides(self.json)
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            overrides.extend(own.ini.iter().cloned());
            self.take_over_file(kind, &overrides, &own.json, &mut guard.entries)?;
        }
        Ok(guard)
    }

    fn take_over_file(
        &self,
        kind: ConfigKind,
        overrides: &[(String, String)],
        json_edits: &[(String, String, Value)],
        entries: &mut Vec<GuardEntry>,
    ) -> KiAutoResult<()> {
        let file = self.file(kind);
        let backup = self.backup(kind);
        if backup.exists() {
            return Err(KiAutoError::ConfigBackupFound { kind, path: backup });
        }
        let original = if file.exists() {
            let contents = fs::read_to_string(&file)
                .map_err(|err| KiAutoError::io(format!("reading {}", file.display()), err))?;
            fs::rename(&file, &backup).map_err(|err| {
                KiAutoError::io(format!("backing up {}", file.display()), err)
            })?;
            Some(contents)
        } else {
            None
        };
        // Registered before writing so a failed write still restores.
        entries.push(GuardEntry {
            file: file.clone(),
            backup: original.is_some().then_some(backup),
        });
        let tuned = if self.json {
            tuned_json(&file, original.as_deref(), json_edits)?
        } else {
            tuned_contents(original.as_deref(), overrides)
        };
        fs::write(&file, tuned)
            .map_err(|err| KiAutoError::io(format!("writing {}", file.display()), err))?;
        debug!(path = %file.display(), "installed unattended {kind} config");
        Ok(())
    }
}

fn default_root(var: impl Fn(&str) -> Option<PathBuf>) -> KiAutoResult<PathBuf> {
    if let Some(dir) = var(KICAD_CONFIG_HOME) {
        return Ok(dir);
    }
    if let Some(dir) = var("XDG_CONFIG_HOME") {
        return Ok(dir.join("kicad"));
    }
    var("HOME")
        .map(|home| home.join(".config").join("kicad"))
        .ok_or_else(|| {
            KiAutoError::InvalidArguments(
                "cannot locate the KiCad configuration: set KICAD_CONFIG_HOME or HOME".to_string(),
            )
        })
}

/// Original INI-style contents with `key=value` overrides applied.
fn tuned_contents(original: Option<&str>, overrides: &[(String, String)]) -> String {
    let mut out = String::new();
    for line in original.unwrap_or("").lines() {
        let key = line.split('=').next().unwrap_or("").trim();
        if overrides.iter().any(|(k, _)| k == key) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    for (key, value) in overrides {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Original JSON contents with `(section, key, value)` edits applied.
///
/// Without edits the file is written back untouched.
fn tuned_json(
    file: &Path,
    original: Option<&str>,
    edits: &[(String, String, Value)],
) -> KiAutoResult<String> {
    let original = original.unwrap_or("");
    if edits.is_empty() {
        return Ok(original.to_string());
    }
    let invalid = |reason: String| {
        KiAutoError::io(
            format!("parsing {}", file.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidData, reason),
        )
    };
    let mut root = if original.trim().is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(original).map_err(|err| invalid(err.to_string()))?
    };
    let Some(object) = root.as_object_mut() else {
        return Err(invalid("top level is not an object".to_string()));
    };
    for (section, key, value) in edits {
        let entry = object
            .entry(section.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Some(section) = entry.as_object_mut() {
            section.insert(key.clone(), value.clone());
        }
    }
    serde_json::to_string_pretty(&root).map_err(|err| invalid(err.to_string()))
}

struct GuardEntry {
    file: PathBuf,
    /// `None` when the user had no file to begin with.
    backup: Option<PathBuf>,
}

/// Restores the user's KiCad configuration when dropped.
pub struct ConfigGuard {
    entries: Vec<GuardEntry>,
}

impl ConfigGuard {
    /// Restore now, reporting failures instead of only logging them.
    pub fn restore(mut self) -> KiAutoResult<()> {
        self.restore_entries()
    }

    fn restore_entries(&mut self) -> KiAutoResult<()> {
        let mut first_error = None;
        // Restore in reverse so a partial take-over unwinds cleanly.
        while let Some(entry) = self.entries.pop() {
            if let Err(err) = restore_entry(&entry) {
                warn!("{err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn restore_entry(entry: &GuardEntry) -> KiAutoResult<()> {
    match &entry.backup {
        Some(backup) => fs::rename(backup, &entry.file).map_err(|err| {
            KiAutoError::io(format!("restoring {}", entry.file.display()), err)
        }),
        None => match fs::remove_file(&entry.file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(KiAutoError::io(
                format!("removing {}", entry.file.display()),
                err,
            )),
        },
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        let _ = self.restore_entries();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KICAD_VERSION_DEFAULT;

    fn config(dir: &Path) -> KicadConfig {
        KicadConfig::new(dir, KICAD_VERSION_DEFAULT)
    }

    #[test]
    fn kicad5_layout_uses_plain_names() {
        let cfg = config(Path::new("/cfg"));
        assert_eq!(cfg.file(ConfigKind::Eeschema), PathBuf::from("/cfg/eeschema"));
        assert_eq!(
            cfg.backup(ConfigKind::KicadCommon),
            PathBuf::from("/cfg/kicad_common.pre_script")
        );
    }

    #[test]
    fn kicad6_layout_uses_versioned_json() {
        let cfg = KicadConfig::new("/cfg", KicadVersion::new(6, 0, 2));
        assert_eq!(
            cfg.file(ConfigKind::Pcbnew),
            PathBuf::from("/cfg/6.0/pcbnew.json")
        );
        assert_eq!(
            cfg.backup(ConfigKind::Pcbnew),
            PathBuf::from("/cfg/6.0/pcbnew.json.pre_script")
        );
    }

    #[test]
    fn root_discovery_order() {
        let only_home = |key: &str| (key == "HOME").then(|| PathBuf::from("/home/u"));
        assert_eq!(
            default_root(only_home).unwrap(),
            PathBuf::from("/home/u/.config/kicad")
        );
        let xdg = |key: &str| match key {
            "XDG_CONFIG_HOME" => Some(PathBuf::from("/xdg")),
            "HOME" => Some(PathBuf::from("/home/u")),
            _ => None,
        };
        assert_eq!(default_root(xdg).unwrap(), PathBuf::from("/xdg/kicad"));
        let explicit = |key: &str| (key == KICAD_CONFIG_HOME).then(|| PathBuf::from("/k"));
        assert_eq!(default_root(explicit).unwrap(), PathBuf::from("/k"));
        assert!(default_root(|_| None).is_err());
    }

    #[test]
    fn tool_specific_backup_is_checked_before_common() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(cfg.backup(ConfigKind::KicadCommon), "x").unwrap();
        fs::write(cfg.backup(ConfigKind::Eeschema), "x").unwrap();
        let err = cfg.check_backups(Tool::Eeschema).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::EeschemaCfgPresent);

        fs::remove_file(cfg.backup(ConfigKind::Eeschema)).unwrap();
        let err = cfg.check_backups(Tool::Eeschema).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::KicadCfgPresent);
        // The check never deletes anything.
        assert!(cfg.backup(ConfigKind::KicadCommon).exists());
    }

    #[test]
    fn pcbnew_ignores_eeschema_backup() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(cfg.backup(ConfigKind::Eeschema), "x").unwrap();
        assert!(cfg.check_backups(Tool::Pcbnew).is_ok());
    }

    #[test]
    fn guard_restores_original_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let eeschema = cfg.file(ConfigKind::Eeschema);
        fs::write(&eeschema, "LibDir=/x\nShowIllegalSymbolLibDialog=1\n").unwrap();

        {
            let _guard = cfg.take_over(Tool::Eeschema).unwrap();
            let tuned = fs::read_to_string(&eeschema).unwrap();
            assert!(tuned.contains("LibDir=/x"));
            assert!(tuned.contains("ShowIllegalSymbolLibDialog=0"));
            assert!(!tuned.contains("ShowIllegalSymbolLibDialog=1"));
            assert!(cfg.backup(ConfigKind::Eeschema).exists());
            assert!(cfg.file(ConfigKind::KicadCommon).exists());
        }

        assert_eq!(
            fs::read_to_string(&eeschema).unwrap(),
            "LibDir=/x\nShowIllegalSymbolLibDialog=1\n"
        );
        assert!(!cfg.backup(ConfigKind::Eeschema).exists());
        // kicad_common did not exist before the run and is gone again.
        assert!(!cfg.file(ConfigKind::KicadCommon).exists());
    }

    #[test]
    fn take_over_refuses_existing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(cfg.backup(ConfigKind::Pcbnew), "x").unwrap();
        let err = cfg.take_over(Tool::Pcbnew).err().unwrap();
        assert_eq!(err.exit_code(), ExitCode::PcbnewCfgPresent);
        assert_eq!(fs::read_to_string(cfg.backup(ConfigKind::Pcbnew)).unwrap(), "x");
    }

    #[test]
    fn extra_keys_go_to_the_tool_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(cfg.file(ConfigKind::Pcbnew), "PlotLayer_0=0\nA=1\n").unwrap();
        let extra = ToolSettings {
            ini: vec![("PlotLayer_0".to_string(), "1".to_string())],
            json: vec![("printing".to_string(), "layers".to_string(), Value::from(vec![0]))],
        };
        let guard = cfg.take_over_with(Tool::Pcbnew, &extra).unwrap();
        let tuned = fs::read_to_string(cfg.file(ConfigKind::Pcbnew)).unwrap();
        assert!(tuned.contains("PlotLayer_0=1"));
        assert!(!tuned.contains("PlotLayer_0=0"));
        assert!(tuned.contains("A=1"));
        let common = fs::read_to_string(cfg.file(ConfigKind::KicadCommon)).unwrap();
        assert!(!common.contains("PlotLayer_0"));
        guard.restore().unwrap();
        assert_eq!(
            fs::read_to_string(cfg.file(ConfigKind::Pcbnew)).unwrap(),
            "PlotLayer_0=0\nA=1\n"
        );
    }

    #[test]
    fn explicit_restore_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(cfg.file(ConfigKind::Pcbnew), "A=1\n").unwrap();
        let guard = cfg.take_over(Tool::Pcbnew).unwrap();
        guard.restore().unwrap();
        assert_eq!(fs::read_to_string(cfg.file(ConfigKind::Pcbnew)).unwrap(), "A=1\n");
    }

    #[test]
    fn json_layout_gets_section_edits() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = KicadConfig::new(dir.path(), KicadVersion::new(6, 0, 0));
        fs::create_dir_all(cfg.dir()).unwrap();
        let original = r#"{"printing":{"monochrome":true},"window":{"size_x":800}}"#;
        fs::write(cfg.file(ConfigKind::Pcbnew), original).unwrap();
        let extra = ToolSettings {
            ini: vec![("PlotLayer_0".to_string(), "1".to_string())],
            json: vec![("printing".to_string(), "layers".to_string(), Value::from(vec![0, 44]))],
        };

        let guard = cfg.take_over_with(Tool::Pcbnew, &extra).unwrap();
        let tuned: Value =
            serde_json::from_str(&fs::read_to_string(cfg.file(ConfigKind::Pcbnew)).unwrap()).unwrap();
        assert_eq!(tuned["printing"]["layers"], Value::from(vec![0, 44]));
        assert_eq!(tuned["printing"]["monochrome"], Value::Bool(true));
        assert_eq!(tuned["window"]["size_x"], Value::from(800));
        assert!(tuned.get("PlotLayer_0").is_none());
        // kicad_common did not exist and gets no edits.
        assert_eq!(fs::read_to_string(cfg.file(ConfigKind::KicadCommon)).unwrap(), "");

        guard.restore().unwrap();
        assert_eq!(fs::read_to_string(cfg.file(ConfigKind::Pcbnew)).unwrap(), original);
    }

    #[test]
    fn malformed_json_config_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = KicadConfig::new(dir.path(), KicadVersion::new(7, 0, 0));
        fs::create_dir_all(cfg.dir()).unwrap();
        fs::write(cfg.file(ConfigKind::Pcbnew), "[1, 2]").unwrap();
        let extra = ToolSettings {
            ini: Vec::new(),
            json: vec![("printing".to_string(), "layers".to_string(), Value::from(vec![0]))],
        };
        let err = cfg.take_over_with(Tool::Pcbnew, &extra).err().unwrap();
        assert_eq!(err.exit_code(), ExitCode::InternalError);
        assert_eq!(fs::read_to_string(cfg.file(ConfigKind::Pcbnew)).unwrap(), "[1, 2]");
        assert!(!cfg.backup(ConfigKind::Pcbnew).exists());
    }
}
