//! Integration tests for the `kestrel` binary.

use std::process::Command;

use tempfile::TempDir;

fn kestrel_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_kestrel"))
}

#[test]
fn cli_capabilities_lists_builtins() {
    let output = kestrel_bin()
        .arg("capabilities")
        .output()
        .expect("failed to run kestrel capabilities");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Available Capabilities"));
    for name in ["passthrough", "mixer", "splitter", "pattern", "peak_meter"] {
        assert!(stdout.contains(name), "listing should contain '{name}'");
    }
}

#[test]
fn cli_capabilities_json_is_parseable() {
    let output = kestrel_bin()
        .args(["capabilities", "--json"])
        .output()
        .expect("failed to run kestrel capabilities --json");
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let entries = value.as_array().expect("top level should be an array");
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[1]["name"], "mixer");
    assert_eq!(entries[1]["id"], "0x000A");
    assert_eq!(entries[1]["category"], "Mixing");
}

#[test]
fn cli_capabilities_unknown_fails() {
    let output = kestrel_bin()
        .args(["capabilities", "reverb"])
        .output()
        .expect("failed to run kestrel capabilities reverb");
    assert!(!output.status.success());
}

#[test]
fn cli_validate_factory_preset() {
    let output = kestrel_bin()
        .args(["validate", "tone-tap"])
        .output()
        .expect("failed to run kestrel validate");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tone-tap: ok"));
    assert!(stdout.contains("src -> split -> meter"));
}

#[test]
fn cli_validate_reports_every_problem() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        r#"
name = "broken"

[[instances]]
name = "pass"
capability = "passthrough"

[[instances]]
name = "echo"
capability = "echo"

[[connections]]
from = "pass.0"
to = "pass.0"
"#,
    )
    .unwrap();

    let output = kestrel_bin()
        .args(["validate", path.to_str().unwrap()])
        .output()
        .expect("failed to run kestrel validate");
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("broken:"));
    assert!(stdout.contains("echo"));
}

#[test]
fn cli_run_stops_after_tick_limit() {
    let output = kestrel_bin()
        .args(["run", "passthrough", "--ticks", "5", "--period-ms", "1"])
        .output()
        .expect("failed to run kestrel run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ticks:            5"), "{stdout}");
}

#[test]
fn cli_run_honours_runtime_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("runtime.toml");
    std::fs::write(&config, "[graph]\nmemory_pool_bytes = 100\n").unwrap();

    let output = kestrel_bin()
        .args(["run", "passthrough", "--ticks", "1", "--config"])
        .arg(&config)
        .output()
        .expect("failed to run kestrel run");
    assert!(!output.status.success());
}
