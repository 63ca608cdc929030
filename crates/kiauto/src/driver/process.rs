//! A KiCad tool running in its own process group.

use crate::error::{KiAutoError, KiAutoResult};
use crate::model::Tool;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::fs::File;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Time a tool gets to exit after SIGTERM before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Something that may stop running while we wait on it.
pub trait Liveness {
    /// Exit status once the process is gone, `None` while it runs.
    fn exited(&mut self) -> KiAutoResult<Option<ExitStatus>>;

    fn tool(&self) -> Tool;

    /// Error describing an unexpected exit or error dialog.
    fn reported_error(&self) -> KiAutoError;
}

/// Spawned eeschema or pcbnew.
///
/// The tool's stdout and stderr go to a log file so a chatty GUI never
/// blocks on a full pipe; the tail of that file is reported when the tool
/// fails. Dropping the handle terminates the whole process group.
pub struct ToolProcess {
    tool: Tool,
    child: Child,
    log: PathBuf,
    done: Option<ExitStatus>,
}

impl ToolProcess {
    /// Start `program` on `input`, logging to `log`.
    pub fn spawn(tool: Tool, program: &Path, input: &Path, log: &Path) -> KiAutoResult<Self> {
        let out = File::create(log)
            .map_err(|err| KiAutoError::io(format!("creating {}", log.display()), err))?;
        let err = out
            .try_clone()
            .map_err(|err| KiAutoError::io(format!("opening {}", log.display()), err))?;
        let child = Command::new(program)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(out)
            .stderr(err)
            .process_group(0)
            .spawn()
            .map_err(|err| spawn_error(program, err))?;
        debug!(pid = child.id(), program = %program.display(), "started {tool}");
        Ok(Self {
            tool,
            child,
            log: log.to_path_buf(),
            done: None,
        })
    }

    /// Last non-empty line the tool wrote, for error reports.
    pub fn last_output_line(&self) -> Option<String> {
        let text = std::fs::read_to_string(&self.log).ok()?;
        text.lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> KiAutoResult<Option<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.exited()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// SIGTERM to the group, then SIGKILL if it is still around after
    /// `grace`.
    pub fn terminate(&mut self, grace: Duration) -> KiAutoResult<Option<ExitStatus>> {
        if self.done.is_some() {
            return Ok(self.done);
        }
        // Process IDs are always positive and fit in i32
        #[allow(clippy::cast_possible_wrap)]
        let pgid = Pid::from_raw(self.child.id() as i32);
        signal_process_group(pgid, Signal::SIGTERM)?;
        if let Some(status) = self.wait_for_exit(grace)? {
            return Ok(Some(status));
        }
        warn!("{} ignored SIGTERM, killing it", self.tool);
        signal_process_group(pgid, Signal::SIGKILL)?;
        self.wait_for_exit(Duration::from_millis(200))
    }
}

impl Liveness for ToolProcess {
    fn exited(&mut self) -> KiAutoResult<Option<ExitStatus>> {
        if self.done.is_some() {
            return Ok(self.done);
        }
        let status = self
            .child
            .try_wait()
            .map_err(|err| KiAutoError::io(format!("waiting for {}", self.tool), err))?;
        self.done = status;
        Ok(status)
    }

    fn tool(&self) -> Tool {
        self.tool
    }

    fn reported_error(&self) -> KiAutoError {
        KiAutoError::tool_reported(self.tool, self.last_output_line())
    }
}

impl Drop for ToolProcess {
    fn drop(&mut self) {
        if let Err(err) = self.terminate(TERMINATE_GRACE) {
            warn!("failed to stop {}: {err}", self.tool);
        }
    }
}

pub(crate) fn signal_process_group(pgid: Pid, signal: Signal) -> KiAutoResult<()> {
    match killpg(pgid, signal) {
        // ESRCH means process already gone, which is fine
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(err) => Err(KiAutoError::io(
            "signalling process group",
            std::io::Error::from(err),
        )),
    }
}

/// Map a spawn failure, turning "no such file" into a missing tool.
pub(crate) fn spawn_error(program: &Path, err: std::io::Error) -> KiAutoError {
    if err.kind() == std::io::ErrorKind::NotFound {
        KiAutoError::MissingTool {
            program: program.display().to_string(),
        }
    } else {
        KiAutoError::io(format!("starting {}", program.display()), err)
    }
}
