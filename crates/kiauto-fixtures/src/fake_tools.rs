//! Stand-ins for eeschema, pcbnew, xdotool and ffmpeg.
//!
//! The CLIs find their external programs through `KIAUTO_*` variables, so
//! the harness points those at small shell scripts. The fake editors load
//! nothing: they check the file header the real tool would choke on and
//! then idle until killed. The fake xdotool never sees a window unless
//! the test sets one:
//!
//! - `KIAUTO_FAKE_WINDOW_ID`: id returned by every `search` except error
//!   dialog searches. Unset means no window ever appears.
//! - `KIAUTO_FAKE_REPORT`: file copied to any `.erc`/`.rpt` path typed.
//!   Typed `.pdf` paths get a stub PDF.
//! - `KIAUTO_FAKE_XDO_LOG`: every xdotool invocation is appended here.

use crate::helpers::write_executable;
use std::io;
use std::path::{Path, PathBuf};

/// Window id the fake xdotool reports.
pub const ENV_FAKE_WINDOW_ID: &str = "KIAUTO_FAKE_WINDOW_ID";
/// Canned report the fake xdotool copies into place.
pub const ENV_FAKE_REPORT: &str = "KIAUTO_FAKE_REPORT";
/// Log of fake xdotool invocations.
pub const ENV_FAKE_XDO_LOG: &str = "KIAUTO_FAKE_XDO_LOG";

const FAKE_EESCHEMA: &str = r#"#!/bin/sh
case "$(head -c 23 "$1" 2>/dev/null)" in
  "EESchema Schematic File") ;;
  *) echo "Failed to load schematic file '$1'" >&2; exit 1 ;;
esac
exec sleep 30
"#;

const FAKE_PCBNEW: &str = r#"#!/bin/sh
case "$(head -c 10 "$1" 2>/dev/null)" in
  "(kicad_pcb") ;;
  *) echo "Failed to load board file '$1'" >&2; exit 1 ;;
esac
exec sleep 30
"#;

const FAKE_XDOTOOL: &str = r#"#!/bin/sh
if [ -n "$KIAUTO_FAKE_XDO_LOG" ]; then
  echo "$*" >> "$KIAUTO_FAKE_XDO_LOG"
fi
for last; do :; done
case "$1" in
  search)
    case "$last" in
      *Error*) exit 1 ;;
    esac
    if [ -n "$KIAUTO_FAKE_WINDOW_ID" ]; then
      echo "$KIAUTO_FAKE_WINDOW_ID"
      exit 0
    fi
    exit 1
    ;;
  type)
    case "$last" in
      *.erc|*.rpt)
        if [ -n "$KIAUTO_FAKE_REPORT" ]; then
          cp "$KIAUTO_FAKE_REPORT" "$last"
        fi
        ;;
      *.pdf) printf '%%PDF-1.4\n%%%%EOF\n' > "$last" ;;
    esac
    ;;
esac
exit 0
"#;

const FAKE_FFMPEG: &str = "#!/bin/sh\nexec sleep 60\n";

/// Paths of the generated fake programs.
#[derive(Clone, Debug)]
pub struct FakeTools {
    /// Fake schematic editor.
    pub eeschema: PathBuf,
    /// Fake board editor.
    pub pcbnew: PathBuf,
    /// Fake xdotool.
    pub xdotool: PathBuf,
    /// Fake ffmpeg.
    pub ffmpeg: PathBuf,
}

impl FakeTools {
    /// Write every fake into `dir`.
    pub fn install(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let tools = Self {
            eeschema: dir.join("eeschema"),
            pcbnew: dir.join("pcbnew"),
            xdotool: dir.join("xdotool"),
            ffmpeg: dir.join("ffmpeg"),
        };
        write_executable(&tools.eeschema, FAKE_EESCHEMA)?;
        write_executable(&tools.pcbnew, FAKE_PCBNEW)?;
        write_executable(&tools.xdotool, FAKE_XDOTOOL)?;
        write_executable(&tools.ffmpeg, FAKE_FFMPEG)?;
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn xdotool(tools: &FakeTools, args: &[&str], window: Option<&str>) -> (bool, String) {
        let mut cmd = Command::new(&tools.xdotool);
        cmd.args(args).env_remove(ENV_FAKE_WINDOW_ID);
        if let Some(id) = window {
            cmd.env(ENV_FAKE_WINDOW_ID, id);
        }
        let out = cmd.output().unwrap();
        (
            out.status.success(),
            String::from_utf8_lossy(&out.stdout).trim().to_string(),
        )
    }

    #[test]
    fn xdotool_search_follows_env() {
        let dir = tempfile::tempdir().unwrap();
        let tools = FakeTools::install(dir.path()).unwrap();
        let search = ["search", "--onlyvisible", "--name", "eeschema.*"];
        assert_eq!(xdotool(&tools, &search, None), (false, String::new()));
        assert_eq!(
            xdotool(&tools, &search, Some("77")),
            (true, "77".to_string())
        );
        let dialog = ["search", "--onlyvisible", "--name", "^(Error)$"];
        assert!(!xdotool(&tools, &dialog, Some("77")).0);
    }

    #[test]
    fn typed_pdf_path_gets_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let tools = FakeTools::install(&dir.path().join("bin")).unwrap();
        let pdf = dir.path().join("printed.pdf");
        let pdf_arg = pdf.display().to_string();
        assert!(xdotool(&tools, &["type", "--delay", "1", &pdf_arg], None).0);
        assert!(std::fs::read_to_string(&pdf).unwrap().starts_with("%PDF"));
    }

    #[test]
    fn fake_eeschema_rejects_bogus_files() {
        let dir = tempfile::tempdir().unwrap();
        let tools = FakeTools::install(dir.path()).unwrap();
        let bogus = dir.path().join("bogus.sch");
        std::fs::write(&bogus, "dummy").unwrap();
        let out = Command::new(&tools.eeschema).arg(&bogus).output().unwrap();
        assert!(!out.status.success());
        assert!(String::from_utf8_lossy(&out.stderr).contains("Failed to load"));
    }
}
