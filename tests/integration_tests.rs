// tests/integration_tests.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn scratch_dir() -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("mission-plan-it-{suffix}-{n}"));
    fs::create_dir_all(&dir).expect("Failed to create scratch dir");
    dir
}

fn run(args: &[&str]) -> Output {
    // Run from a scratch dir so no stray mission-plan.toml is picked up.
    let dir = scratch_dir();
    let output = Command::new(env!("CARGO_BIN_EXE_mission-plan"))
        .args(args)
        .current_dir(&dir)
        .env_remove("MISSION_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run mission-plan");
    let _ = fs::remove_dir_all(&dir);
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_project_structure() {
    let expected_files = vec![
        "src/main.rs",
        "src/lib.rs",
        "src/plan.rs",
        "src/model.rs",
        "src/legacy.rs",
        "src/storage.rs",
        "src/sync.rs",
        "src/config.rs",
        "Cargo.toml",
        "README.md",
    ];

    for file in expected_files {
        assert!(Path::new(file).exists(), "Expected file {} not found", file);
    }
}

#[test]
fn test_cargo_toml_metadata() {
    let cargo_content = fs::read_to_string("Cargo.toml").expect("Failed to read Cargo.toml");

    assert!(cargo_content.contains("name = \"mission-plan\""), "Missing package name");
    assert!(cargo_content.contains("description ="), "Missing description");
    assert!(cargo_content.contains("license ="), "Missing license");
    assert!(cargo_content.contains("readme ="), "Missing readme");
}

#[test]
fn test_help_lists_flags() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("--plan"));
    assert!(text.contains("--legacy"));
    assert!(text.contains("MISSION_CONFIG"));
}

#[test]
fn test_unknown_flag_fails() {
    let output = run(&["--bogus"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown argument: --bogus"));
}

#[test]
fn test_structured_plan_summary() {
    let plan = fixture("sample.plan");
    let output = run(&["--plan", plan.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("home 47.3977000,8.5456000 alt 488.0 m, 4 items"));
    assert!(text.contains("TAKEOFF"));
    assert!(text.contains(" child "));
    assert!(text.contains("LAND"));
    assert!(text.contains("max telemetry"));
}

#[test]
fn test_legacy_plan_summary() {
    let plan = fixture("sample.waypoints");
    let output = run(&["--plan", plan.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("home 47.3977000,8.5456000 alt 488.0 m, 3 items"));
    assert!(!text.contains(" child "));
}

#[test]
fn test_bad_legacy_line_reports_line_number() {
    let plan = fixture("bad_latitude.waypoints");
    let output = run(&["--plan", plan.to_str().unwrap()]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Failed to load plan"), "stderr: {err}");
    assert!(err.contains("line 3"), "stderr: {err}");
}

#[test]
fn test_convert_structured_to_legacy() {
    let dir = scratch_dir();
    let target = dir.join("converted.waypoints");
    let plan = fixture("sample.plan");
    let output = run(&[
        "--plan",
        plan.to_str().unwrap(),
        "--save",
        target.to_str().unwrap(),
        "--legacy",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let written = fs::read_to_string(&target).expect("Failed to read converted plan");
    assert!(written.starts_with("QGC WPL 110\r\n"));
    let rows: Vec<&str> = written.lines().skip(1).collect();
    assert!(rows.len() > 4, "survey children should be flattened");
    for (i, row) in rows.iter().enumerate() {
        assert!(row.starts_with(&format!("{i}\t")), "row {i}: {row}");
        assert_eq!(row.split('\t').count(), 12);
    }
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_edits_and_structured_save() {
    let dir = scratch_dir();
    let target = dir.join("edited.plan");
    let output = run(&[
        "--home",
        "47.0,8.0,400",
        "--insert",
        "47.001,8.0,30",
        "--insert-survey",
        "47.002,8.001,0",
        "--save",
        target.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let written = fs::read_to_string(&target).expect("Failed to read saved plan");
    let json: serde_json::Value = serde_json::from_str(&written).expect("saved plan is JSON");
    assert_eq!(json["version"], "1.0");
    assert_eq!(json["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["complexItems"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["complexItems"][0]["position"], 2);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_sim_vehicle_upload() {
    let output = run(&[
        "--home",
        "47.0,8.0,400",
        "--insert",
        "47.001,8.0,30",
        "--sim-vehicle",
        "--sim-latency-ms",
        "1",
        "--upload",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("vehicle holds 2 mission items"));
    assert!(text.contains("unsent changes: no"));
}
