//! CLI integration tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const PIPELINE: &str = r#"{
    "version": "cli-test",
    "preprocessor": {"transformers": [
        {"name": "cat", "kind": "categorical", "columns": ["airline"], "categories": [["AA", "GLO"]]},
        {"name": "bin", "kind": "binary", "columns": ["is_day_before_holiday", "is_last_wave"]}
    ]},
    "model": {"trees": [
        {"nodes": [
            {"feature": 2, "threshold": 0.5, "left": 1, "right": 2, "cover": 100.0},
            {"value": -1.0, "cover": 80.0},
            {"value": 2.0, "cover": 20.0}
        ]}
    ]}
}"#;

const STATS: &str = r#"{"global_delay_rate": 0.2, "airline_delay_rate": {"GLO": 0.25}}"#;

struct Fixture {
    dir: TempDir,
    model: PathBuf,
    stats: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("pipeline.json");
    let stats = dir.path().join("stats.json");
    std::fs::write(&model, PIPELINE).unwrap();
    std::fs::write(&stats, STATS).unwrap();
    Fixture { dir, model, stats }
}

const FDP_VARS: [&str; 8] = [
    "FDP_CONFIG",
    "FDP_MODEL_PATH",
    "FDP_STATS_PATH",
    "FDP_THRESHOLD",
    "FDP_TOP_N",
    "FDP_HOLIDAY_CALENDAR",
    "FDP_MODEL_SHA256",
    "FDP_STATS_SHA256",
];

/// Run the binary isolated from the caller's environment and home config
fn fdp(home: &Path, args: &[&str]) -> Output {
    fdp_with_env(home, &[], args)
}

/// Like `fdp`, with the given `FDP_*` variables set for the child
fn fdp_with_env(home: &Path, vars: &[(&str, &str)], args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_fdp"));
    command.args(args).env("HOME", home);
    for name in FDP_VARS {
        command.env_remove(name);
    }
    for (name, value) in vars {
        command.env(name, value);
    }
    command.output().expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let fx = fixture();
    let output = fdp(fx.dir.path(), &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Flight Delay Predictor"), "Should show app name");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("explain"), "Should show explain command");
    assert!(stdout.contains("inspect"), "Should show inspect command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let fx = fixture();
    let output = fdp(fx.dir.path(), &["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("fdp"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let fx = fixture();
    let output = fdp(fx.dir.path(), &["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    assert!(stdout.contains("--airline"), "Should show airline option");
    assert!(stdout.contains("--departure"), "Should show departure option");
    assert!(stdout.contains("--request"), "Should show request option");
    assert!(stdout.contains("--explain"), "Should show explain option");
}

#[test]
fn test_predict_json_output() {
    let fx = fixture();
    let output = fdp(
        fx.dir.path(),
        &[
            "--model",
            fx.model.to_str().unwrap(),
            "--stats",
            fx.stats.to_str().unwrap(),
            "--format",
            "json",
            "predict",
            "--airline",
            "GLO",
            "--origin",
            "GRU",
            "--destination",
            "SDU",
            "--departure",
            "2024-12-24T18:00:00",
            "--explain",
            "--top-n",
            "2",
        ],
    );
    assert!(
        output.status.success(),
        "predict failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["label"], "Delayed");
    assert_eq!(value["prediction"], 1);
    assert_eq!(value["departure_datetime"], "2024-12-24T18:00:00");
    let factors = value["top_factors"].as_array().unwrap();
    assert!(factors.len() <= 2);
    assert_eq!(factors[0]["feature"], "is_day_before_holiday");
    assert_eq!(factors[0]["direction"], "increase_delay");
}

#[test]
fn test_threshold_flag_changes_label() {
    let fx = fixture();
    // sigmoid(2.0) is about 0.88
    let output = fdp(
        fx.dir.path(),
        &[
            "--model",
            fx.model.to_str().unwrap(),
            "--threshold",
            "0.95",
            "--format",
            "json",
            "predict",
            "--airline",
            "GLO",
            "--origin",
            "GRU",
            "--destination",
            "SDU",
            "--departure",
            "2024-12-24T18:00:00",
        ],
    );
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["label"], "On Time");
    assert_eq!(value["threshold_used"], 0.95);
}

#[test]
fn test_explain_from_request_file() {
    let fx = fixture();
    let request = fx.dir.path().join("request.json");
    std::fs::write(
        &request,
        r#"{"airline": "GLO", "origin_airport": "GRU", "destination_airport": "SDU",
            "departure_datetime": "2024-03-05 21:30"}"#,
    )
    .unwrap();

    let output = fdp(
        fx.dir.path(),
        &[
            "--model",
            fx.model.to_str().unwrap(),
            "--format",
            "json",
            "explain",
            "--request",
            request.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    let factors: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = factors
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["feature"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"is_last_wave"));
    assert!(!names.contains(&"airline_AA"));
}

#[test]
fn test_inspect_from_config_file() {
    let fx = fixture();
    let config = fx.dir.path().join("fdp.toml");
    std::fs::write(
        &config,
        format!(
            "model_path = {:?}\nthreshold = 0.7\ntop_n = 3\n",
            fx.model.to_str().unwrap()
        ),
    )
    .unwrap();

    let output = fdp(
        fx.dir.path(),
        &["--config", config.to_str().unwrap(), "--format", "json", "inspect"],
    );
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["model_version"], "cli-test");
    assert_eq!(value["threshold"], 0.7);
    assert_eq!(value["top_n"], 3);
    assert_eq!(value["stats_loaded"], false);
    assert_eq!(value["features"].as_array().unwrap().len(), 4);
    assert_eq!(value["features"][0]["name"], "cat__airline_AA");
    assert_eq!(value["model_checksum"].as_str().unwrap().len(), 64);
}

#[test]
fn test_environment_overrides_file_and_flags_override_environment() {
    let fx = fixture();
    let config = fx.dir.path().join("fdp.toml");
    std::fs::write(&config, "threshold = 0.6\ntop_n = 4\nholiday_calendar = \"brazil\"\n")
        .unwrap();
    let model = fx.model.to_str().unwrap();
    let vars = [
        ("FDP_MODEL_PATH", model),
        ("FDP_THRESHOLD", "0.7"),
        ("FDP_TOP_N", "7"),
        ("FDP_HOLIDAY_CALENDAR", "united_states"),
    ];

    let output = fdp_with_env(
        fx.dir.path(),
        &vars,
        &["--config", config.to_str().unwrap(), "--format", "json", "inspect"],
    );
    assert!(
        output.status.success(),
        "inspect failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["model_version"], "cli-test");
    assert_eq!(value["threshold"], 0.7);
    assert_eq!(value["top_n"], 7);
    assert_eq!(value["holiday_calendar"], "united_states");

    let output = fdp_with_env(
        fx.dir.path(),
        &vars,
        &[
            "--config",
            config.to_str().unwrap(),
            "--threshold",
            "0.9",
            "--calendar",
            "brazil",
            "--format",
            "json",
            "inspect",
        ],
    );
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["threshold"], 0.9);
    assert_eq!(value["holiday_calendar"], "brazil");
    assert_eq!(value["top_n"], 7);
}

#[test]
fn test_predict_explain_table_shows_departure() {
    let fx = fixture();
    let output = fdp(
        fx.dir.path(),
        &[
            "--model",
            fx.model.to_str().unwrap(),
            "predict",
            "--airline",
            "GLO",
            "--origin",
            "GRU",
            "--destination",
            "SDU",
            "--departure",
            "2024-12-24T18:00:00",
            "--explain",
        ],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Departure:         2024-12-24T18:00:00"),
        "stdout: {}",
        stdout
    );
}

#[test]
fn test_invalid_request_fails() {
    let fx = fixture();
    let output = fdp(
        fx.dir.path(),
        &[
            "--model",
            fx.model.to_str().unwrap(),
            "predict",
            "--airline",
            "GLO",
            "--origin",
            "GRU",
            "--destination",
            "SDU",
            "--departure",
            "not a date",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("departure timestamp"), "stderr: {}", stderr);
}

#[test]
fn test_missing_model_fails() {
    let fx = fixture();
    let output = fdp(
        fx.dir.path(),
        &["--model", "/nonexistent/pipeline.json", "inspect"],
    );
    assert!(!output.status.success());
}
