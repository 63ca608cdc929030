//! Thin client for the `xdotool` command line program.

use super::process::spawn_error;
use crate::error::{KiAutoError, KiAutoResult};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::trace;

/// X11 window id as printed by `xdotool search`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowId(pub String);

/// Looks windows up by title.
pub trait WindowProbe {
    /// First visible window whose title matches `pattern`.
    fn find_window(&self, pattern: &str) -> KiAutoResult<Option<WindowId>>;
}

/// Sends keystrokes to the focused window.
pub trait Keyboard {
    /// Raise and focus `window`, returning once it has focus.
    fn focus(&self, window: &WindowId) -> KiAutoResult<()>;
    /// Press each chord in turn (`ctrl+p`, `Return`).
    fn keys(&self, keys: &[String]) -> KiAutoResult<()>;
    /// Type `text` literally.
    fn type_text(&self, text: &str) -> KiAutoResult<()>;
}

/// The `xdotool` program, typing with a fixed delay between keys.
#[derive(Clone, Debug)]
pub struct Xdotool {
    program: PathBuf,
    key_delay: Duration,
}

impl Xdotool {
    /// Client for `program`.
    pub fn new(program: impl Into<PathBuf>, key_delay: Duration) -> Self {
        Self {
            program: program.into(),
            key_delay,
        }
    }

    fn run(&self, args: &[&str]) -> KiAutoResult<Output> {
        trace!(?args, "xdotool");
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| spawn_error(&self.program, err))
    }

    fn run_checked(&self, args: &[&str]) -> KiAutoResult<()> {
        let output = self.run(args)?;
        if output.status.success() {
            return Ok(());
        }
        Err(KiAutoError::io(
            format!("xdotool {}", args.first().copied().unwrap_or_default()),
            std::io::Error::other(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        ))
    }

    fn delay_ms(&self) -> String {
        self.key_delay.as_millis().to_string()
    }
}

impl WindowProbe for Xdotool {
    fn find_window(&self, pattern: &str) -> KiAutoResult<Option<WindowId>> {
        let output = self.run(&["search", "--onlyvisible", "--name", pattern])?;
        // xdotool exits 1 when nothing matches.
        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_first_id(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Keyboard for Xdotool {
    fn focus(&self, window: &WindowId) -> KiAutoResult<()> {
        self.run_checked(&["windowactivate", "--sync", &window.0])
    }

    fn keys(&self, keys: &[String]) -> KiAutoResult<()> {
        let delay = self.delay_ms();
        let mut args = vec!["key", "--delay", delay.as_str()];
        args.extend(keys.iter().map(String::as_str));
        self.run_checked(&args)
    }

    fn type_text(&self, text: &str) -> KiAutoResult<()> {
        let delay = self.delay_ms();
        self.run_checked(&["type", "--delay", &delay, text])
    }
}

fn parse_first_id(stdout: &str) -> Option<WindowId> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()))
        .map(|line| WindowId(line.to_string()))
}
