use crate::{camera::Camera, error::CaptureError, util::now_rfc3339};
use std::time::Duration;
use tracing::{debug, warn};

/// A single still image pulled off the live feed. JPEG-encoded, owned by the
/// capture stage until handed to the classifier.
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub captured_at: String,
}

impl Frame {
    pub fn new(jpeg: Vec<u8>) -> Self {
        Self {
            jpeg,
            captured_at: now_rfc3339(),
        }
    }
}

/// Grab one frame, retrying up to `max_attempts` times with a fixed backoff
/// between failed attempts. Every attempt is a full open/read/release cycle
/// on the feed; RTSP streams drop often enough that this is the one stage
/// with explicit retry.
pub fn capture_with_retry<C: Camera + ?Sized>(
    camera: &C,
    max_attempts: u32,
    backoff: Duration,
) -> Result<Frame, CaptureError> {
    let mut last = String::from("no attempts made");

    for attempt in 1..=max_attempts {
        match camera.grab_frame() {
            Ok(frame) => {
                debug!(
                    "captured frame on attempt {attempt}/{max_attempts} ({} bytes)",
                    frame.jpeg.len()
                );
                return Ok(frame);
            }
            Err(err) => {
                warn!("capture attempt {attempt}/{max_attempts} failed: {err}");
                last = err.to_string();
                if attempt < max_attempts {
                    std::thread::sleep(backoff);
                }
            }
        }
    }

    Err(CaptureError::Exhausted {
        attempts: max_attempts,
        last,
    })
}
