use crate::{
    camera::Camera,
    classify::Classifier,
    config::Config,
    frame::{self, Frame},
    interpret::{self, Target},
    report::{JobReport, Outcome},
    util::{ensure_dir, now_rfc3339},
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Drives one job run: for each target in configured order, position the
/// camera, capture a frame, classify it, interpret the answer. Each stage
/// failure becomes an ERROR outcome for that target only; the remaining
/// targets still run, and the report always carries one outcome per target.
pub struct Inspector<C: Camera, L: Classifier> {
    cfg: Config,
    camera: C,
    classifier: L,
}

impl<C: Camera, L: Classifier> Inspector<C, L> {
    pub fn new(cfg: &Config, camera: C, classifier: L) -> Self {
        Self {
            cfg: cfg.clone(),
            camera,
            classifier,
        }
    }

    pub fn run_job(&self, targets: &[Target]) -> JobReport {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.inspect_target(target));
        }
        let report = JobReport::from_outcomes(outcomes);
        info!("job done overall={:?}", report.overall);
        report
    }

    pub fn inspect_target(&self, target: &Target) -> Outcome {
        let name = target.name();
        info!(
            "target {name} -> preset {:?}",
            target.spec.preset_token
        );

        if let Err(err) = self.camera.goto_preset(&target.spec.preset_token) {
            warn!("target {name}: positioning failed: {err}");
            return Outcome::error(name, format!("positioning failed: {err}"));
        }

        let backoff = Duration::from_secs(self.cfg.capture.retry_backoff_seconds);
        let frame = match frame::capture_with_retry(
            &self.camera,
            self.cfg.capture.max_attempts,
            backoff,
        ) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("target {name}: capture failed: {err}");
                return Outcome::error(name, format!("capture failed: {err}"));
            }
        };

        if self.cfg.output.save_frames {
            // Operator diagnostics only; a full disk must not fail the check.
            if let Err(err) = self.save_frame(name, &frame) {
                warn!("target {name}: could not save frame artifact: {err:#}");
            }
        }

        let raw = match self.classifier.classify(&frame, target) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("target {name}: inference failed: {err}");
                return Outcome::error(name, format!("inference failed: {err}"));
            }
        };

        let status = interpret::interpret(&raw, target);
        info!("target {name} status={status:?} answer={raw:?}");

        Outcome {
            target: name.to_string(),
            status,
            raw_text: raw,
            at: now_rfc3339(),
        }
    }

    /// Fixed path per target, overwritten every run; only the most recent
    /// frame is kept.
    pub fn frame_path(&self, target_name: &str) -> PathBuf {
        Path::new(&self.cfg.output.out_dir).join(format!("full_{target_name}.jpg"))
    }

    fn save_frame(&self, target_name: &str, frame: &Frame) -> anyhow::Result<()> {
        ensure_dir(Path::new(&self.cfg.output.out_dir))?;
        let path = self.frame_path(target_name);
        std::fs::write(&path, &frame.jpeg)?;
        info!("saved frame artifact {}", path.display());
        Ok(())
    }
}
