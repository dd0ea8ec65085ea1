//! Integration tests for sapm-cli.
//!
//! Runs the built `sapm` binary against the factory card tables. The config
//! directory is pointed at a temporary directory so user cards on the host
//! do not leak into the results.

use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// Helper to get the `sapm` binary with an isolated config directory.
fn sapm_bin(home: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sapm"));
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

fn run_ok(home: &TempDir, args: &[&str]) -> String {
    let output = sapm_bin(home).args(args).output().expect("failed to run sapm");
    assert!(
        output.status.success(),
        "sapm {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn run_err(home: &TempDir, args: &[&str]) -> Output {
    let output = sapm_bin(home).args(args).output().expect("failed to run sapm");
    assert!(!output.status.success(), "sapm {:?} should fail", args);
    output
}

fn simulate_json(home: &TempDir, args: &[&str]) -> Value {
    let mut full = vec!["simulate"];
    full.extend_from_slice(args);
    full.push("--json");
    serde_json::from_str(&run_ok(home, &full)).expect("simulate should print JSON")
}

fn names(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string"))
        .collect()
}

// ---------------------------------------------------------------------------
// Listing and inspection
// ---------------------------------------------------------------------------

#[test]
fn cli_help_works() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(&home, &["--help"]);
    for cmd in ["cards", "info", "simulate", "export"] {
        assert!(stdout.contains(cmd), "help should mention '{cmd}'");
    }
}

#[test]
fn cli_cards_lists_factory_tables() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(&home, &["cards"]);
    assert!(stdout.contains("Factory Cards"));
    assert!(stdout.contains("hi3516-codec"));
    assert!(stdout.contains("demo-playback"));
    assert!(stdout.contains("(none)"), "no user cards expected");
}

#[test]
fn cli_info_shows_graph() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(&home, &["info", "hi3516-codec"]);
    assert!(stdout.contains("Components (9)"));
    assert!(stdout.contains("Routes (6)"));
    assert!(stdout.contains("Controls (14)"));
    assert!(stdout.contains("DACL"));
    assert!(stdout.contains("Master Playback Volume"));
    assert!(stdout.contains("!0x20:15"), "inverted ADCL power bit");
}

#[test]
fn cli_unknown_card_fails() {
    let home = TempDir::new().unwrap();
    let output = run_err(&home, &["info", "no-such-card"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("card not found"), "got: {stderr}");
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[test]
fn cli_simulate_dacl_enable() {
    let home = TempDir::new().unwrap();
    let report = simulate_json(&home, &["hi3516-codec", "--set", "Dacl enable=1"]);

    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0]["action"], "set Dacl enable=1");
    assert_eq!(names(&steps[0]["powered_up"]), ["DACL", "SPKL"]);
    assert_eq!(report["codec_registers"]["0x14"], 1 << 11);
    assert_eq!(report["codec_registers"]["0x30"], 1 << 27);
    assert_eq!(report["sleeping"], false);
}

#[test]
fn cli_simulate_sleep_and_resume() {
    let home = TempDir::new().unwrap();
    let report = simulate_json(
        &home,
        &["hi3516-codec", "--set", "Dacl enable=1", "--sleep", "--resume"],
    );

    let steps = report["steps"].as_array().unwrap();
    let actions: Vec<&str> = steps.iter().map(|s| s["action"].as_str().unwrap()).collect();
    assert_eq!(
        actions,
        [
            "set Dacl enable=1",
            "idle expiry 1: armed",
            "idle expiry 2: slept",
            "resume"
        ]
    );
    assert_eq!(names(&steps[2]["powered_down"]), ["SPKL", "DACL"]);
    assert_eq!(names(&steps[3]["powered_up"]), ["DACL", "SPKL"]);
    // The switch register survives the sweep.
    assert_eq!(report["codec_registers"]["0x30"], 1 << 27);
    assert_eq!(report["sleeping"], false);
}

#[test]
fn cli_simulate_text_report() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(
        &home,
        &["simulate", "hi3516-codec", "-s", "Dacl enable=1", "-s", "Master Playback Volume=0x50"],
    );
    assert!(stdout.contains("up:   DACL, SPKL"));
    assert!(stdout.contains("Powered: DACL, SPKL"));
    assert!(stdout.contains("0x2004 = 0x00005000"));
}

#[test]
fn cli_simulate_stream_event() {
    let home = TempDir::new().unwrap();
    let report = simulate_json(&home, &["demo-playback", "--stream", "Playback=start"]);
    let components = report["components"].as_array().unwrap();
    let dac = components.iter().find(|c| c["name"] == "DAC").unwrap();
    assert_eq!(dac["active"], true);
}

#[test]
fn cli_simulate_rejects_bad_input() {
    let home = TempDir::new().unwrap();
    run_err(&home, &["simulate", "hi3516-codec", "--set", "Nope=1"]);
    run_err(&home, &["simulate", "hi3516-codec", "--set", "Dacl enable"]);
    run_err(&home, &["simulate", "hi3516-codec", "--set", "Dacl enable=2"]);
    run_err(&home, &["simulate", "hi3516-codec", "--resume"]);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn cli_export_then_info_from_file() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("out").join("demo.toml");
    let path_str = path.to_str().unwrap();

    let stdout = run_ok(&home, &["export", "demo-playback", path_str]);
    assert!(stdout.contains("Wrote card 'demo-playback'"));
    assert!(path.is_file());

    run_err(&home, &["export", "demo-playback", path_str]);
    run_ok(&home, &["export", "demo-playback", path_str, "--force"]);

    let stdout = run_ok(&home, &["info", path_str]);
    assert!(stdout.contains("Card: demo-playback"));
    assert!(stdout.contains("Bypass Mux"));
}
