//! KiCad release numbers and the layout changes tied to them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A KiCad release number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KicadVersion {
    /// Major release.
    pub major: u32,
    /// Minor release; 99 marks a nightly of the next major.
    pub minor: u32,
    /// Patch level, 0 when not given.
    pub patch: u32,
}

/// First nightly build with the versioned JSON configuration layout.
pub const KICAD_VERSION_5_99: KicadVersion = KicadVersion::new(5, 99, 0);

/// Version assumed when nothing better is known.
pub const KICAD_VERSION_DEFAULT: KicadVersion = KicadVersion::new(5, 1, 0);

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").unwrap()
    })
}

impl KicadVersion {
    /// Version `major.minor.patch`.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Find the first `major.minor[.patch]` in a version banner.
    ///
    /// Accepts the raw output of `kicad-cli version` as well as strings such
    /// as `(5.1.9)-1` or `6.0.0-rc1`.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = version_regex().captures(text)?;
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        Some(Self::new(field(1)?, field(2)?, field(3).unwrap_or(0)))
    }

    /// KiCad 5.99 and newer keep settings in `<config>/<major>.<minor>/*.json`.
    pub fn uses_json_config(&self) -> bool {
        *self >= KICAD_VERSION_5_99
    }

    /// Name of the versioned configuration sub-directory (`6.0`, `7.0`, ...).
    ///
    /// Nightlies (`x.99`) store their settings under the next major release.
    pub fn config_dir_name(&self) -> String {
        if self.minor == 99 {
            format!("{}.0", self.major + 1)
        } else {
            format!("{}.{}", self.major, self.minor)
        }
    }
}

impl fmt::Display for KicadVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
