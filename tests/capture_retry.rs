use coop_watch::camera::{Camera, CameraDiag};
use coop_watch::error::{CaptureError, PositionError};
use coop_watch::frame::{Frame, capture_with_retry};
use std::cell::Cell;
use std::time::Duration;

struct FlakyCamera {
    fail_first: u32,
    grabs: Cell<u32>,
}

impl FlakyCamera {
    fn new(fail_first: u32) -> Self {
        Self {
            fail_first,
            grabs: Cell::new(0),
        }
    }
}

impl Camera for FlakyCamera {
    fn doctor(&self) -> anyhow::Result<CameraDiag> {
        Ok(CameraDiag {
            onvif_endpoint: "stub".into(),
            reachable: true,
            ffmpeg_exe: "ffmpeg".into(),
            ffmpeg_version: None,
            ok: true,
            error: None,
        })
    }

    fn goto_preset(&self, _preset_token: &str) -> Result<(), PositionError> {
        Ok(())
    }

    fn grab_frame(&self) -> Result<Frame, CaptureError> {
        let n = self.grabs.get() + 1;
        self.grabs.set(n);
        if n <= self.fail_first {
            Err(CaptureError::Open("stream refused".into()))
        } else {
            Ok(Frame::new(vec![0xFF, 0xD8, 0xFF, 0xD9]))
        }
    }
}

#[test]
fn returns_frame_after_transient_failures() {
    let camera = FlakyCamera::new(2);
    let frame = capture_with_retry(&camera, 3, Duration::ZERO).expect("frame");
    assert_eq!(camera.grabs.get(), 3);
    assert!(frame.jpeg.starts_with(&[0xFF, 0xD8]));
}

#[test]
fn first_attempt_success_skips_retry() {
    let camera = FlakyCamera::new(0);
    capture_with_retry(&camera, 3, Duration::ZERO).expect("frame");
    assert_eq!(camera.grabs.get(), 1);
}

#[test]
fn exhausts_attempts_and_reports_count() {
    let camera = FlakyCamera::new(u32::MAX);
    let err = capture_with_retry(&camera, 3, Duration::ZERO).unwrap_err();
    assert_eq!(camera.grabs.get(), 3);
    match err {
        CaptureError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(last.contains("stream refused"));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}
