//! Driving the KiCad GUI.
//!
//! The rest of the crate only sees the [`Automation`] trait: given a
//! [`Job`] it starts the tool, replays a key script and returns once the
//! expected artifact exists. [`XdoAutomation`] is the real implementation,
//! built on `xdotool` against a running X server. Tests substitute their
//! own.
//!
//! Every wait in here is bounded, checks the cancellation flag and checks
//! whether the tool died; the three ways a wait can end badly map to
//! `StartTimeout`, `Interrupted` and the tool's `*_ERROR` code.

pub mod process;
pub mod recorder;
pub mod xdotool;

use crate::error::{KiAutoError, KiAutoResult};
use crate::model::Tool;
use crate::settings::Settings;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub use process::{Liveness, ToolProcess, TERMINATE_GRACE};
pub use recorder::{screencast_path, Recorder};
pub use xdotool::{Keyboard, WindowId, WindowProbe, Xdotool};

/// How often windows and artifacts are polled for.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Titles of the dialogs KiCad opens when it cannot load a file.
pub const ERROR_DIALOG_PATTERN: &str = r"^(Error|Error loading .*|File Open Error)$";

/// Shared flag set from the Ctrl-C handler.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token nobody has cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every wait holding a clone of this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> KiAutoResult<()> {
        if self.is_cancelled() {
            Err(KiAutoError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// One step of the keyboard script replayed against the tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyStep {
    /// Key chords, `xdotool key` syntax (`ctrl+s`, `Tab`, `Return`).
    Keys(Vec<String>),
    /// Literal text, typed into the focused field.
    Type(String),
    /// Wait for a window whose title matches, then focus it.
    WaitWindow(String),
}

impl KeyStep {
    /// [`KeyStep::Keys`] from string literals.
    pub fn keys(keys: &[&str]) -> Self {
        Self::Keys(keys.iter().map(|k| (*k).to_string()).collect())
    }

    /// Type a path into the focused file field.
    pub fn type_path(path: &Path) -> Self {
        Self::Type(path.display().to_string())
    }

    /// [`KeyStep::WaitWindow`] for a title regex.
    pub fn wait_window(pattern: &str) -> Self {
        Self::WaitWindow(pattern.to_string())
    }
}

/// Work handed to an [`Automation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Program to start.
    pub tool: Tool,
    /// File the tool is started on.
    pub input: PathBuf,
    /// Directory for the tool log and recordings.
    pub output_dir: PathBuf,
    /// File the script makes the tool write.
    pub artifact: PathBuf,
    /// Keystrokes played once the main window is focused.
    pub script: Vec<KeyStep>,
}

/// Runs a [`Job`] against a real or simulated tool.
pub trait Automation {
    /// Returns once `job.artifact` has been written.
    fn run(&self, job: &Job) -> KiAutoResult<()>;
}

/// Wait until a window titled like `pattern` shows up.
///
/// Fails with the tool's error when it exits or opens an error dialog
/// first, and with `StartTimeout` once `bound` has passed.
pub fn wait_for_window<P, L>(
    probe: &P,
    tool: &mut L,
    pattern: &str,
    bound: Duration,
    cancel: &CancelToken,
) -> KiAutoResult<WindowId>
where
    P: WindowProbe + ?Sized,
    L: Liveness + ?Sized,
{
    let deadline = Instant::now() + bound;
    debug!(pattern, bound_secs = bound.as_secs(), "waiting for window");
    loop {
        cancel.check()?;
        if tool.exited()?.is_some() {
            return Err(tool.reported_error());
        }
        if probe.find_window(ERROR_DIALOG_PATTERN)?.is_some() {
            debug!("error dialog detected");
            return Err(tool.reported_error());
        }
        if let Some(id) = probe.find_window(pattern)? {
            debug!(pattern, id = %id.0, "window found");
            return Ok(id);
        }
        if Instant::now() >= deadline {
            return Err(KiAutoError::StartTimeout {
                tool: tool.tool(),
                waited: bound,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Wait until `path` exists and its size stopped changing.
pub fn wait_for_artifact<L>(
    path: &Path,
    tool: &mut L,
    bound: Duration,
    cancel: &CancelToken,
) -> KiAutoResult<()>
where
    L: Liveness + ?Sized,
{
    let deadline = Instant::now() + bound;
    let mut last_len = None;
    loop {
        cancel.check()?;
        let len = std::fs::metadata(path).ok().map(|m| m.len());
        if len.is_some() && len == last_len {
            debug!(path = %path.display(), "artifact ready");
            return Ok(());
        }
        last_len = len;
        // A tool that exits before writing anything failed.
        if len.is_none() && tool.exited()?.is_some() {
            return Err(tool.reported_error());
        }
        if Instant::now() >= deadline {
            return Err(KiAutoError::ArtifactTimeout {
                tool: tool.tool(),
                path: path.to_path_buf(),
                waited: bound,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Replay `steps`; window waits use `bound`.
pub fn play<D, L>(
    xdo: &D,
    tool: &mut L,
    steps: &[KeyStep],
    bound: Duration,
    cancel: &CancelToken,
) -> KiAutoResult<()>
where
    D: WindowProbe + Keyboard + ?Sized,
    L: Liveness + ?Sized,
{
    for step in steps {
        cancel.check()?;
        if tool.exited()?.is_some() {
            return Err(tool.reported_error());
        }
        debug!(?step, "key script");
        match step {
            KeyStep::Keys(keys) => xdo.keys(keys)?,
            KeyStep::Type(text) => xdo.type_text(text)?,
            KeyStep::WaitWindow(pattern) => {
                let id = wait_for_window(xdo, tool, pattern, bound, cancel)?;
                xdo.focus(&id)?;
            }
        }
    }
    Ok(())
}

/// [`Automation`] on a live X display through `xdotool`.
#[derive(Clone, Debug)]
pub struct XdoAutomation {
    settings: Settings,
    record: bool,
    cancel: CancelToken,
}

impl XdoAutomation {
    /// Automation using `settings`, recording the session when `record` is
    /// set and giving up once `cancel` fires.
    pub fn new(settings: Settings, record: bool, cancel: CancelToken) -> Self {
        Self {
            settings,
            record,
            cancel,
        }
    }
}

impl Automation for XdoAutomation {
    fn run(&self, job: &Job) -> KiAutoResult<()> {
        let recorder = if self.record {
            Some(Recorder::start(
                &self.settings.ffmpeg,
                self.settings.capture,
                &screencast_path(&job.output_dir, job.tool),
            )?)
        } else {
            None
        };

        let program = self.settings.tool_path(job.tool);
        let log = job.output_dir.join(format!("{}.log", job.tool.program()));
        info!("Starting {} on {}", job.tool, job.input.display());
        let mut tool = ToolProcess::spawn(job.tool, &program, &job.input, &log)?;

        let xdo = Xdotool::new(&self.settings.xdotool, self.settings.key_delay());
        let bound = self.settings.wait_start();
        let main = wait_for_window(
            &xdo,
            &mut tool,
            job.tool.main_window_pattern(),
            bound,
            &self.cancel,
        )?;
        xdo.focus(&main)?;
        play(&xdo, &mut tool, &job.script, bound, &self.cancel)?;
        wait_for_artifact(
            &job.artifact,
            &mut tool,
            self.settings.artifact_timeout(),
            &self.cancel,
        )?;
        info!("Closing {}", job.tool);
        tool.terminate(TERMINATE_GRACE)?;

        if let Some(recorder) = recorder {
            recorder.stop()?;
        }
        Ok(())
    }
}
