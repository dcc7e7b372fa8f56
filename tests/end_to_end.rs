use std::fs;
use std::path::Path;

use makeup_sched::error::{ModelError, SolveError};
use makeup_sched::{
    InputFiles, RawInput, SchedulerConfig, SchedulerError, export_workbooks, schedule_exams,
    verify_schedule, write_json,
};

fn write_inputs(dir: &Path, with_in_class: bool) {
    fs::write(
        dir.join("Horarios.json"),
        r#"{
            "A": {"seg": [0, 0], "ter": [1, 0]},
            "B": {"seg": [0, 1], "ter": [0, 0]}
        }"#,
    )
    .unwrap();
    fs::write(dir.join("Dias.json"), r#"["seg", "ter"]"#).unwrap();
    fs::write(
        dir.join("AlunosEmRecuperacao.json"),
        r#"{
            "A": {"student1": ["MAT", "FIS"]},
            "B": {"student1": ["MAT"]}
        }"#,
    )
    .unwrap();
    if with_in_class {
        fs::write(dir.join("ExamesEmAula.json"), r#"{"A": {"FIS": [2]}}"#).unwrap();
    }
}

fn names(buckets: &[Vec<String>]) -> Vec<Vec<&str>> {
    buckets
        .iter()
        .map(|bucket| bucket.iter().map(String::as_str).collect())
        .collect()
}

#[test]
fn two_courses_share_mat_in_first_slot() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path(), false);
    let config = SchedulerConfig::default();

    let raw = RawInput::load(dir.path(), &config.files).unwrap();
    let (relations, schedule) = schedule_exams(&raw, &config).unwrap();

    assert_eq!(schedule.latest_slot, 1);
    assert!(schedule.proven_optimal);
    assert_eq!(
        names(schedule.course("A").unwrap()),
        vec![vec!["MAT"], vec!["FIS"], vec![], vec![]]
    );
    assert_eq!(
        names(schedule.course("B").unwrap()),
        vec![vec!["MAT"], vec![], vec![], vec![]]
    );
    assert!(verify_schedule(&relations, &schedule, config.max_exams_per_day).is_empty());

    let out = dir.path().join("out");
    let json = dir.path().join("schedule.json");
    write_json(&schedule, &json).unwrap();
    let workbooks =
        export_workbooks(&relations, &raw, &schedule, &out, &config.time_labels).unwrap();
    assert_eq!(workbooks.len(), 2);
    assert!(out.join("A.xlsx").exists());
    assert!(out.join("B.xlsx").exists());

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(
        written,
        serde_json::json!({
            "A": [["MAT"], ["FIS"], [], []],
            "B": [["MAT"], [], [], []],
        })
    );
}

#[test]
fn in_class_exam_is_not_rescheduled() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path(), true);
    let config = SchedulerConfig::default();

    let raw = RawInput::load(dir.path(), &config.files).unwrap();
    let (_, schedule) = schedule_exams(&raw, &config).unwrap();

    assert_eq!(schedule.latest_slot, 0);
    assert_eq!(schedule.slot_of("A", "FIS"), None);
    assert_eq!(schedule.slot_of("A", "MAT"), Some(0));
    assert_eq!(schedule.slot_of("B", "MAT"), Some(0));
}

#[test]
fn custom_file_names_are_honored() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path(), false);
    fs::rename(dir.path().join("Dias.json"), dir.path().join("calendario.json")).unwrap();
    let files = InputFiles {
        days: "calendario.json".into(),
        ..InputFiles::default()
    };

    let raw = RawInput::load(dir.path(), &files).unwrap();
    assert_eq!(raw.days, vec!["seg", "ter"]);
}

#[test]
fn overloaded_course_is_reported_infeasible() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path(), false);
    // A keeps a single free slot for a student with two exams.
    fs::write(
        dir.path().join("Horarios.json"),
        r#"{
            "A": {"seg": [0, 1], "ter": [1, 1]},
            "B": {"seg": [0, 1], "ter": [0, 0]}
        }"#,
    )
    .unwrap();
    let config = SchedulerConfig::default().with_time_limit_secs(2.0);

    let raw = RawInput::load(dir.path(), &config.files).unwrap();
    let err = schedule_exams(&raw, &config).unwrap_err();
    match err {
        SchedulerError::Solve(SolveError::NoSolution { diagnostics, .. }) => {
            assert_eq!(diagnostics.len(), 3);
        }
        other => panic!("expected NoSolution, got {other}"),
    }
}

#[test]
fn course_without_free_slots_fails_before_solving() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path(), false);
    fs::write(
        dir.path().join("Horarios.json"),
        r#"{
            "A": {"seg": [0, 0], "ter": [1, 0]},
            "B": {"seg": [1, 1], "ter": [1, 1]}
        }"#,
    )
    .unwrap();
    let config = SchedulerConfig::default();

    let raw = RawInput::load(dir.path(), &config.files).unwrap();
    let err = schedule_exams(&raw, &config).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Model(ModelError::EmptyDomain { ref course, subjects: 1 }) if course == "B"
    ));
}
