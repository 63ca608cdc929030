//! Screen recording geometry.

use serde::{Deserialize, Serialize};

/// Default recording width in pixels.
pub const REC_W: u32 = 1366;
/// Default recording height in pixels.
pub const REC_H: u32 = 768;

/// Screen area captured when a session is recorded.
///
/// Only used by the screen recorder; it has no effect on the automation
/// itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for CaptureGeometry {
    fn default() -> Self {
        Self {
            width: REC_W,
            height: REC_H,
        }
    }
}

impl CaptureGeometry {
    /// `WxH`, the form `ffmpeg -video_size` expects.
    pub fn video_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
