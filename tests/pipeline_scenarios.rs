use coop_watch::camera::{Camera, CameraDiag};
use coop_watch::classify::Classifier;
use coop_watch::config::{Config, TargetSpec};
use coop_watch::error::{CaptureError, InferenceError, PositionError};
use coop_watch::frame::Frame;
use coop_watch::interpret::{Status, Target, compile_all};
use coop_watch::pipeline::Inspector;
use coop_watch::report::{JobReport, Outcome};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
struct StubCamera {
    bad_presets: Vec<String>,
    dead_feed_presets: Vec<String>,
    current: RefCell<String>,
    grabs: Arc<AtomicU32>,
}

impl Camera for StubCamera {
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

    fn goto_preset(&self, preset_token: &str) -> Result<(), PositionError> {
        if self.bad_presets.iter().any(|p| p == preset_token) {
            return Err(PositionError::Fault {
                action: "GotoPreset".into(),
                detail: "stub fault".into(),
            });
        }
        *self.current.borrow_mut() = preset_token.to_string();
        Ok(())
    }

    fn grab_frame(&self) -> Result<Frame, CaptureError> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        if self.dead_feed_presets.contains(&*self.current.borrow()) {
            return Err(CaptureError::Open("no route to camera".into()));
        }
        Ok(Frame::new(vec![0xFF, 0xD8, 0xFF, 0xD9]))
    }
}

struct StubClassifier {
    answers: HashMap<String, String>,
}

impl StubClassifier {
    fn new(answers: &[(&str, &str)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Classifier for StubClassifier {
    fn classify(&self, _frame: &Frame, target: &Target) -> Result<String, InferenceError> {
        match self.answers.get(target.name()) {
            Some(answer) => Ok(answer.clone()),
            None => Err(InferenceError::InvalidResponse(
                "no scripted answer".into(),
            )),
        }
    }
}

fn mk_spec(name: &str, preset: &str) -> TargetSpec {
    TargetSpec {
        name: name.into(),
        preset_token: preset.into(),
        question: format!("check the {name}"),
        ok_marker: "OKAY".into(),
        problem_marker: "PROBLEM".into(),
    }
}

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.capture.retry_backoff_seconds = 0;
    cfg.output.save_frames = false;
    cfg.targets = vec![mk_spec("roost", "p1"), mk_spec("door", "p2")];
    cfg
}

fn run(cfg: &Config, camera: StubCamera, classifier: StubClassifier) -> JobReport {
    let targets = compile_all(&cfg.targets).expect("compile targets");
    Inspector::new(cfg, camera, classifier).run_job(&targets)
}

#[test]
fn both_targets_okay() {
    let cfg = test_config();
    let classifier = StubClassifier::new(&[
        ("roost", "(OKAY - 5 Chickens found)"),
        ("door", "(OKAY - Door is closed)"),
    ]);
    let report = run(&cfg, StubCamera::default(), classifier);

    assert_eq!(report.overall, Status::Ok);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes.iter().all(|o| o.status == Status::Ok));
}

#[test]
fn open_door_flags_problem() {
    let cfg = test_config();
    let classifier = StubClassifier::new(&[
        ("roost", "(OKAY - 5 Chickens found)"),
        ("door", "(PROBLEM - DOOR IS STILL OPEN)"),
    ]);
    let report = run(&cfg, StubCamera::default(), classifier);

    assert_ne!(report.overall, Status::Ok);
    assert_eq!(report.outcomes[1].target, "door");
    assert_eq!(report.outcomes[1].status, Status::Problem);
    assert_eq!(report.outcomes[0].status, Status::Ok);
}

#[test]
fn position_failure_skips_capture_but_not_other_targets() {
    let cfg = test_config();
    let grabs = Arc::new(AtomicU32::new(0));
    let camera = StubCamera {
        bad_presets: vec!["p1".into()],
        grabs: grabs.clone(),
        ..Default::default()
    };
    let classifier = StubClassifier::new(&[
        ("roost", "(OKAY - 5 Chickens found)"),
        ("door", "(OKAY - Door is closed)"),
    ]);
    let report = run(&cfg, camera, classifier);

    assert_eq!(report.outcomes[0].status, Status::Error);
    assert!(report.outcomes[0].raw_text.contains("positioning failed"));
    assert_eq!(report.outcomes[1].status, Status::Ok);
    // Only the door target ever touched the feed.
    assert_eq!(grabs.load(Ordering::SeqCst), 1);
}

#[test]
fn capture_exhaustion_still_covers_every_target() {
    let cfg = test_config();
    let grabs = Arc::new(AtomicU32::new(0));
    let camera = StubCamera {
        dead_feed_presets: vec!["p1".into()],
        grabs: grabs.clone(),
        ..Default::default()
    };
    let classifier = StubClassifier::new(&[
        ("roost", "(OKAY - 5 Chickens found)"),
        ("door", "(OKAY - Door is closed)"),
    ]);
    let report = run(&cfg, camera, classifier);

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].status, Status::Error);
    assert!(report.outcomes[0].raw_text.contains("capture failed"));
    assert_eq!(report.outcomes[1].status, Status::Ok);
    // roost burns the full retry budget, door succeeds first try.
    assert_eq!(grabs.load(Ordering::SeqCst), cfg.capture.max_attempts + 1);
}

#[test]
fn inference_failure_becomes_error_outcome() {
    let cfg = test_config();
    let classifier = StubClassifier::new(&[("door", "(OKAY - Door is closed)")]);
    let report = run(&cfg, StubCamera::default(), classifier);

    assert_eq!(report.outcomes[0].status, Status::Error);
    assert!(report.outcomes[0].raw_text.contains("inference failed"));
    assert_eq!(report.outcomes[1].status, Status::Ok);
}

#[test]
fn outcomes_follow_configured_order() {
    let cfg = test_config();
    let classifier = StubClassifier::new(&[]);
    let report = run(&cfg, StubCamera::default(), classifier);

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.target.as_str()).collect();
    assert_eq!(names, vec!["roost", "door"]);
}

#[test]
fn overall_prefers_problem_over_error() {
    let report = JobReport::from_outcomes(vec![
        Outcome::error("roost", "positioning failed: stub".into()),
        Outcome {
            target: "door".into(),
            status: Status::Problem,
            raw_text: "(PROBLEM - DOOR IS STILL OPEN)".into(),
            at: "2026-08-06T00:00:00Z".into(),
        },
    ]);
    assert_eq!(report.overall, Status::Problem);
}
