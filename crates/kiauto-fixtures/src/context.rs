//! Per-test working context for CLI integration tests.
//!
//! A [`TestContext`] owns a private directory holding a copy of a fixture
//! project, an output directory, a KiCad configuration root and the fake
//! external programs. The CLI runs as a child process with its environment
//! pinned to that directory, its stdout and stderr captured to files that
//! [`search_out`](TestContext::search_out) and
//! [`search_err`](TestContext::search_err) scan afterwards.
//!
//! Each CLI run gets a process group of its own. A run that outlives its
//! bound gets SIGTERM on the whole group, so the CLI can stop KiCad and put
//! the configuration back, and SIGKILL once the grace period is over.

use crate::fake_tools::FakeTools;
use crate::helpers::{copy_files, remove_tree, temp_dir};
use kiauto::driver::process::TERMINATE_GRACE;
use kiauto::kicad_config::{ConfigKind, KicadConfig, KICAD_CONFIG_HOME};
use kiauto::settings::{ENV_FFMPEG, ENV_KICAD_VERSION, ENV_XDOTOOL};
use kiauto::{KicadVersion, Tool, KICAD_VERSION_DEFAULT, WAIT_START};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use regex::Regex;
use std::ffi::OsString;
use std::fs::{self, File};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Extra time the harness grants on top of the CLI's own startup wait.
pub const HARNESS_SLACK: Duration = Duration::from_secs(30);

/// Time a runaway CLI gets between SIGTERM and SIGKILL. Longer than the
/// CLI's own grace for KiCad so it can finish its clean-up first.
pub const STOP_GRACE: Duration = Duration::from_secs(TERMINATE_GRACE.as_secs() + 3);

/// Fixture projects shipped with this crate.
pub fn projects_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("projects")
}

/// Why a CLI run did not produce an exit code.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The CLI binary could not be started.
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        /// Binary the context was created with.
        program: PathBuf,
        /// Error from `spawn`.
        #[source]
        source: std::io::Error,
    },
    /// The run outlived its bound and its process group was stopped.
    #[error("CLI still running after {} s, killed", .0.as_secs())]
    Timeout(Duration),
    /// The CLI died from a signal instead of exiting.
    #[error("CLI terminated by a signal")]
    Signaled,
    /// Log files, waiting or signalling failed.
    #[error("harness I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Errno> for HarnessError {
    fn from(errno: Errno) -> Self {
        Self::Io(std::io::Error::from(errno))
    }
}

/// Per-run tweaks for [`TestContext::run_with`].
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Input file instead of the project's default; relative names are
    /// taken from the project directory.
    pub filename: Option<PathBuf>,
    /// Arguments appended after the input and output paths.
    pub trailing: Vec<String>,
    /// Extra environment for the child.
    pub env: Vec<(String, OsString)>,
    /// Pass the arguments as given, without input and output paths.
    pub raw: bool,
}

impl RunOptions {
    /// Options running on `path` instead of the default input.
    pub fn filename(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    /// Add `key=value` to the child's environment.
    #[must_use]
    pub fn env(mut self, key: &str, value: impl Into<OsString>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    /// Append `args` after the input and output paths.
    #[must_use]
    pub fn trailing(mut self, args: &[&str]) -> Self {
        self.trailing.extend(args.iter().map(|a| (*a).to_string()));
        self
    }
}

/// A CLI started by [`TestContext::spawn`].
///
/// The CLI leads its own process group. Dropping a handle whose CLI is
/// still running stops the group the same way a timeout does.
pub struct RunningCli {
    child: Child,
    done: Option<ExitStatus>,
}

impl RunningCli {
    fn pid(&self) -> Pid {
        // Process IDs are always positive and fit in i32
        #[allow(clippy::cast_possible_wrap)]
        let raw = self.child.id() as i32;
        Pid::from_raw(raw)
    }

    fn poll(&mut self) -> Result<Option<ExitStatus>, HarnessError> {
        if self.done.is_none() {
            self.done = self.child.try_wait()?;
        }
        Ok(self.done)
    }

    fn wait_for(&mut self, timeout: Duration) -> Result<Option<ExitStatus>, HarnessError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.poll()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Whether the CLI has exited.
    pub fn has_exited(&mut self) -> Result<bool, HarnessError> {
        Ok(self.poll()?.is_some())
    }

    /// Send `signal` to the CLI process alone, as a shell or CI runner would.
    pub fn signal(&self, signal: Signal) -> Result<(), HarnessError> {
        kill(self.pid(), signal)?;
        Ok(())
    }

    /// Wait up to `timeout` for the exit code. Past the bound the process
    /// group gets SIGTERM, then SIGKILL after [`STOP_GRACE`].
    pub fn wait(mut self, timeout: Duration) -> Result<i32, HarnessError> {
        match self.wait_for(timeout)? {
            Some(status) => status.code().ok_or(HarnessError::Signaled),
            None => {
                self.stop_group()?;
                Err(HarnessError::Timeout(timeout))
            }
        }
    }

    fn stop_group(&mut self) -> Result<(), HarnessError> {
        let pgid = self.pid();
        signal_group(pgid, Signal::SIGTERM)?;
        self.wait_for(STOP_GRACE)?;
        // Leftover members outlive the leader, so the group is killed even
        // when the CLI itself went away on SIGTERM.
        signal_group(pgid, Signal::SIGKILL)?;
        if self.done.is_none() {
            self.done = Some(self.child.wait()?);
        }
        Ok(())
    }
}

impl Drop for RunningCli {
    fn drop(&mut self) {
        if matches!(self.poll(), Ok(None)) {
            let _ = self.stop_group();
        }
    }
}

fn signal_group(pgid: Pid, signal: Signal) -> Result<(), HarnessError> {
    match killpg(pgid, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

/// One integration test's private world: project copy, output directory,
/// KiCad configuration root and fake tools.
pub struct TestContext {
    /// Test name, used in assertion messages and the directory name.
    pub name: String,
    /// Editor the CLI under test drives.
    pub tool: Tool,
    /// Private root; everything below is removed on clean-up.
    pub root: PathBuf,
    /// Copy of the fixture project.
    pub project_dir: PathBuf,
    /// Output directory passed to the CLI.
    pub output_dir: PathBuf,
    /// What the child sees as `KICAD_CONFIG_HOME`.
    pub kicad_cfg_dir: PathBuf,
    /// Version the child is told to assume.
    pub kicad_version: KicadVersion,
    /// Fake external programs the child runs.
    pub fakes: FakeTools,
    config: KicadConfig,
    input: PathBuf,
    cli_bin: PathBuf,
    timeout: Duration,
    cleaned: bool,
}

impl TestContext {
    /// Context for an `eeschema_do` test on `project`.
    pub fn sch(name: &str, project: &str, cli_bin: impl Into<PathBuf>) -> Self {
        Self::new(name, project, Tool::Eeschema, cli_bin.into())
    }

    /// Context for a `pcbnew_do` test on `project`.
    pub fn pcb(name: &str, project: &str, cli_bin: impl Into<PathBuf>) -> Self {
        Self::new(name, project, Tool::Pcbnew, cli_bin.into())
    }

    fn new(name: &str, project: &str, tool: Tool, cli_bin: PathBuf) -> Self {
        let root = temp_dir(name);
        let project_dir = root.join(project);
        copy_files(&projects_dir().join(project), &project_dir)
            .unwrap_or_else(|err| panic!("cannot copy fixture project {project}: {err}"));
        let output_dir = root.join("output");
        fs::create_dir_all(&output_dir).expect("failed to create output directory");
        let kicad_cfg_dir = root.join("kicad-config");
        let fakes = FakeTools::install(&root.join("bin")).expect("failed to install fake tools");
        let kicad_version = std::env::var(ENV_KICAD_VERSION)
            .ok()
            .and_then(|v| KicadVersion::parse(&v))
            .unwrap_or(KICAD_VERSION_DEFAULT);
        let extension = match tool {
            Tool::Eeschema => "sch",
            Tool::Pcbnew => "kicad_pcb",
        };
        let input = project_dir.join(format!("{project}.{extension}"));
        Self {
            name: name.to_string(),
            tool,
            config: KicadConfig::new(&kicad_cfg_dir, kicad_version),
            root,
            project_dir,
            output_dir,
            kicad_cfg_dir,
            kicad_version,
            fakes,
            input,
            cli_bin,
            timeout: WAIT_START + HARNESS_SLACK,
            cleaned: false,
        }
    }

    /// Bound on how long a single CLI run may take.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default input file of the project.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Configuration file of `kind` as KiCad would use it.
    pub fn config_file(&self, kind: ConfigKind) -> PathBuf {
        self.config.file(kind)
    }

    /// Where the CLI moves the configuration file of `kind` during a run.
    pub fn config_backup(&self, kind: ConfigKind) -> PathBuf {
        self.config.backup(kind)
    }

    /// Plant a stale `.pre_script` back-up for `kind`.
    pub fn create_config_backup(&self, kind: ConfigKind) -> PathBuf {
        fs::create_dir_all(self.config.dir()).expect("failed to create KiCad config dir");
        let backup = self.config.backup(kind);
        fs::write(&backup, "Dummy back-up\n").expect("failed to write config back-up");
        backup
    }

    /// Write a file into the project copy.
    pub fn write_project_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.project_dir.join(name);
        fs::write(&path, contents).expect("failed to write project file");
        path
    }

    /// Path of `name` inside the output directory.
    pub fn get_out_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    fn out_log(&self) -> PathBuf {
        self.root.join("cli.out")
    }

    fn err_log(&self) -> PathBuf {
        self.root.join("cli.err")
    }

    fn command(&self, args: &[&str], opts: &RunOptions) -> Command {
        let mut cmd = Command::new(&self.cli_bin);
        cmd.args(args);
        if !opts.raw {
            let input = match &opts.filename {
                Some(f) if f.is_relative() => self.project_dir.join(f),
                Some(f) => f.clone(),
                None => self.input.clone(),
            };
            cmd.arg(input).arg(&self.output_dir);
            cmd.args(&opts.trailing);
        }
        cmd.current_dir(&self.root)
            .process_group(0)
            .stdin(Stdio::null())
            .env_remove("RUST_LOG")
            .env_remove(crate::fake_tools::ENV_FAKE_WINDOW_ID)
            .env_remove(crate::fake_tools::ENV_FAKE_REPORT)
            .env_remove(crate::fake_tools::ENV_FAKE_XDO_LOG)
            .env(KICAD_CONFIG_HOME, &self.kicad_cfg_dir)
            .env(Tool::Eeschema.env_override(), &self.fakes.eeschema)
            .env(Tool::Pcbnew.env_override(), &self.fakes.pcbnew)
            .env(ENV_XDOTOOL, &self.fakes.xdotool)
            .env(ENV_FFMPEG, &self.fakes.ffmpeg)
            .env(ENV_KICAD_VERSION, self.kicad_version.to_string());
        for (key, value) in &opts.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Start the CLI without waiting for it.
    ///
    /// `args` are the CLI arguments before the input and output paths,
    /// which the harness appends.
    pub fn spawn(&self, args: &[&str], opts: &RunOptions) -> Result<RunningCli, HarnessError> {
        let mut cmd = self.command(args, opts);
        cmd.stdout(File::create(self.out_log())?)
            .stderr(File::create(self.err_log())?);
        let child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            program: self.cli_bin.clone(),
            source,
        })?;
        Ok(RunningCli { child, done: None })
    }

    /// Run the CLI and return its exit code.
    pub fn try_run(&self, args: &[&str], opts: &RunOptions) -> Result<i32, HarnessError> {
        self.spawn(args, opts)?.wait(self.timeout)
    }

    /// Bound set by [`with_timeout`](Self::with_timeout).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run with the default input and assert the exit code.
    pub fn run(&self, args: &[&str], expected: i32) {
        self.run_with(args, expected, &RunOptions::default());
    }

    /// Run and assert the exit code, showing stderr on mismatch.
    ///
    /// # Panics
    ///
    /// Panics when the run fails to complete or exits with another code.
    pub fn run_with(&self, args: &[&str], expected: i32, opts: &RunOptions) {
        let code = self
            .try_run(args, opts)
            .unwrap_or_else(|err| panic!("{}: {err}", self.name));
        assert_eq!(
            code,
            expected,
            "{}: unexpected exit code, stderr:\n{}",
            self.name,
            self.stderr()
        );
    }

    /// Everything the last run wrote to stdout.
    pub fn stdout(&self) -> String {
        fs::read_to_string(self.out_log()).unwrap_or_default()
    }

    /// Everything the last run wrote to stderr.
    pub fn stderr(&self) -> String {
        fs::read_to_string(self.err_log()).unwrap_or_default()
    }

    /// First match of `pattern` in the captured stderr, line anchors
    /// enabled.
    pub fn search_err(&self, pattern: &str) -> Option<String> {
        search(pattern, &self.stderr())
    }

    /// Like [`search_err`](Self::search_err), on stdout.
    pub fn search_out(&self, pattern: &str) -> Option<String> {
        search(pattern, &self.stdout())
    }

    /// Remove everything the context created. Safe to call repeatedly.
    pub fn clean_up(&mut self) {
        if let Err(err) = remove_tree(&self.root) {
            panic!("{}: clean-up failed: {err}", self.name);
        }
        self.cleaned = true;
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if !self.cleaned {
            let _ = remove_tree(&self.root);
        }
    }
}

fn search(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(&format!("(?m){pattern}")).expect("invalid search pattern");
    re.find(text).map(|m| m.as_str().to_string())
}
