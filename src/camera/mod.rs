pub mod onvif;

use crate::error::{CaptureError, PositionError};
use crate::frame::Frame;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use onvif::OnvifCamera;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDiag {
    pub onvif_endpoint: String,
    pub reachable: bool,
    pub ffmpeg_exe: String,
    pub ffmpeg_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// The physical-camera boundary: aim it, then pull one frame off the feed.
/// `goto_preset` blocks until the move is acknowledged and the viewpoint has
/// settled; `grab_frame` is a single open/read/release attempt with no retry
/// of its own.
pub trait Camera {
    fn doctor(&self) -> Result<CameraDiag>;
    fn goto_preset(&self, preset_token: &str) -> Result<(), PositionError>;
    fn grab_frame(&self) -> Result<Frame, CaptureError>;
}
