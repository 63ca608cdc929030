//! Screen recording of a run with ffmpeg's x11grab input.

use super::process::{signal_process_group, spawn_error};
use crate::error::KiAutoResult;
use crate::model::{CaptureGeometry, Tool};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const STOP_GRACE: Duration = Duration::from_secs(5);

/// File name of the recording for `tool` inside the output directory.
pub fn screencast_path(output_dir: &Path, tool: Tool) -> PathBuf {
    output_dir.join(format!("{}_screencast.ogv", tool.program()))
}

/// Arguments for recording `display` into `out`.
pub fn ffmpeg_args(display: &str, geometry: CaptureGeometry, out: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "x11grab".to_string(),
        "-video_size".to_string(),
        geometry.video_size(),
        "-i".to_string(),
        display.to_string(),
        "-codec:v".to_string(),
        "libtheora".to_string(),
        "-qscale:v".to_string(),
        "10".to_string(),
        out.display().to_string(),
    ]
}

/// Running ffmpeg; stopped with SIGINT so the file is finalized.
pub struct Recorder {
    child: Child,
    out: PathBuf,
}

impl Recorder {
    /// Start recording the current `DISPLAY` into `out`.
    pub fn start(ffmpeg: &Path, geometry: CaptureGeometry, out: &Path) -> KiAutoResult<Self> {
        let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
        let child = Command::new(ffmpeg)
            .args(ffmpeg_args(&display, geometry, out))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|err| spawn_error(ffmpeg, err))?;
        info!("Recording session to {}", out.display());
        Ok(Self {
            child,
            out: out.to_path_buf(),
        })
    }

    /// Stop and wait for ffmpeg to finish the file.
    pub fn stop(mut self) -> KiAutoResult<()> {
        self.stop_inner()
    }

    fn stop_inner(&mut self) -> KiAutoResult<()> {
        if self.child.try_wait().ok().flatten().is_some() {
            return Ok(());
        }
        // Process IDs are always positive and fit in i32
        #[allow(clippy::cast_possible_wrap)]
        let pgid = Pid::from_raw(self.child.id() as i32);
        signal_process_group(pgid, Signal::SIGINT)?;
        let deadline = Instant::now() + STOP_GRACE;
        while Instant::now() < deadline {
            if self.child.try_wait().ok().flatten().is_some() {
                debug!(path = %self.out.display(), "recording finished");
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        warn!("ffmpeg did not stop, recording may be truncated");
        signal_process_group(pgid, Signal::SIGKILL)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let _ = self.stop_inner();
        let _ = self.child.try_wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screencast_lands_in_output_dir() {
        assert_eq!(
            screencast_path(Path::new("/out"), Tool::Pcbnew),
            PathBuf::from("/out/pcbnew_screencast.ogv")
        );
    }

    #[test]
    fn args_use_capture_geometry() {
        let args = ffmpeg_args(":99", CaptureGeometry::default(), Path::new("/o/x.ogv"));
        let size = args.iter().position(|a| a == "-video_size").unwrap();
        assert_eq!(args[size + 1], "1366x768");
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == ":99"));
        assert_eq!(args.last().unwrap(), "/o/x.ogv");
    }
}
