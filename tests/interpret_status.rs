use coop_watch::config::TargetSpec;
use coop_watch::interpret::{Status, Target, interpret};

fn mk_target(ok_marker: &str, problem_marker: &str) -> Target {
    Target::compile(&TargetSpec {
        name: "door".into(),
        preset_token: "preset2".into(),
        question: "Is the coop door fully closed?".into(),
        ok_marker: ok_marker.into(),
        problem_marker: problem_marker.into(),
    })
    .expect("compile target")
}

#[test]
fn ok_when_only_ok_marker_matches() {
    let t = mk_target("OKAY", "PROBLEM");
    assert_eq!(interpret("(OKAY - Door is closed)", &t), Status::Ok);
}

#[test]
fn problem_marker_alone() {
    let t = mk_target("OKAY", "PROBLEM");
    assert_eq!(
        interpret("(PROBLEM - DOOR IS STILL OPEN)", &t),
        Status::Problem
    );
}

#[test]
fn problem_takes_precedence_over_ok() {
    let t = mk_target("OKAY", "PROBLEM");
    assert_eq!(
        interpret("It would be OKAY except there is a PROBLEM with the latch", &t),
        Status::Problem
    );
}

#[test]
fn unrecognized_text_is_error() {
    let t = mk_target("OKAY", "PROBLEM");
    assert_eq!(
        interpret("I cannot tell from this image.", &t),
        Status::Error
    );
}

#[test]
fn markers_match_case_insensitively() {
    let t = mk_target("OKAY", "PROBLEM");
    assert_eq!(interpret("okay - door is closed", &t), Status::Ok);
    assert_eq!(interpret("problem - door open", &t), Status::Problem);
}

#[test]
fn anchored_marker_ignores_okay_in_narrative() {
    // Regex markers let an operator pin the match to the reply structure.
    let t = mk_target(r"^\(OKAY", "PROBLEM");
    assert_eq!(interpret("(OKAY - Door is closed)", &t), Status::Ok);
    assert_eq!(
        interpret("The door looked OKAY yesterday but today I am not sure", &t),
        Status::Error
    );
}

#[test]
fn invalid_marker_pattern_is_rejected() {
    let spec = TargetSpec {
        name: "door".into(),
        preset_token: "preset2".into(),
        question: "q".into(),
        ok_marker: "(OKAY".into(),
        problem_marker: "PROBLEM".into(),
    };
    assert!(Target::compile(&spec).is_err());
}
