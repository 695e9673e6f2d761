#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;

fn wsstream(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wsstream"))
        .args(args)
        .output()
        .expect("wsstream should run")
}

fn json_stdout(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout should be one JSON document")
}

fn temp_file(tag: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "wsstream-cli-{tag}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, contents).expect("temp file should be writable");
    path
}

#[test]
fn version_prints_package_version() {
    let output = wsstream(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("wsstream {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_lists_features() {
    let output = wsstream(&["version", "--extended"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: wsstream"));
    assert!(stdout.contains("cli=true"));
}

#[test]
fn plan_splits_payload_into_header_and_frame() {
    let output = wsstream(&[
        "--format",
        "json",
        "plan",
        "--uri",
        "ws://example.com/ws",
        "--max-early-data",
        "16",
        "--early-data-header",
        "Sec-WebSocket-Protocol",
        "--data",
        "AAAAAAAAAAAAAAAAXXXX",
    ]);
    assert!(output.status.success());

    let plan = json_stdout(&output);
    assert_eq!(plan["uri"], "ws://example.com/ws");
    assert_eq!(plan["early_len"], 16);
    assert_eq!(plan["late_len"], 4);
    assert_eq!(plan["headers"][0][0], "sec-websocket-protocol");
    assert_eq!(plan["headers"][0][1], "QUFBQUFBQUFBQUFBQUFBQQ");
}

#[test]
fn plan_appends_early_data_to_uri() {
    let output = wsstream(&[
        "--format",
        "json",
        "plan",
        "--uri",
        "ws://example.com/ws",
        "--max-early-data",
        "64",
        "--data",
        "hello",
    ]);
    assert!(output.status.success());
    let plan = json_stdout(&output);
    assert_eq!(plan["uri"], "ws://example.com/wsaGVsbG8");
    assert_eq!(plan["late_len"], 0);
}

#[test]
fn plan_without_uri_is_usage_error() {
    let output = wsstream(&["plan", "--data", "x"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--uri"));
}

#[test]
fn plan_reads_config_file() {
    let config = temp_file(
        "plan",
        r#"{"uri": "ws://cfg.example/ws", "max_early_data": 2,
            "early_data_header_name": "X-Early"}"#,
    );
    let output = wsstream(&[
        "--format",
        "json",
        "plan",
        "--config",
        config.to_str().expect("utf-8 path"),
        "--data",
        "abc",
    ]);
    let _ = std::fs::remove_file(&config);

    assert!(output.status.success());
    let plan = json_stdout(&output);
    assert_eq!(plan["uri"], "ws://cfg.example/ws");
    assert_eq!(plan["early_len"], 2);
    assert_eq!(plan["headers"][0][0], "x-early");
}

#[test]
fn malformed_config_is_data_invalid() {
    let config = temp_file("bad", "{not json");
    let output = wsstream(&[
        "plan",
        "--config",
        config.to_str().expect("utf-8 path"),
    ]);
    let _ = std::fs::remove_file(&config);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn loopback_round_trips_through_early_data() {
    let output = wsstream(&[
        "--format",
        "json",
        "loopback",
        "--max-early-data",
        "16",
        "--early-data-header",
        "Sec-WebSocket-Protocol",
        "--data",
        "AAAAAAAAAAAAAAAAXXXX",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = json_stdout(&output);
    assert_eq!(report["dials"], 1);
    assert_eq!(report["early_bytes"], 16);
    assert_eq!(report["late_bytes"], 4);
    assert_eq!(report["echoed_bytes"], 20);
    assert_eq!(report["matched"], true);
}

#[test]
fn loopback_without_early_data_dials_directly() {
    let output = wsstream(&["--format", "json", "loopback", "--data", "plain"]);
    assert!(output.status.success());

    let report = json_stdout(&output);
    assert_eq!(report["early_bytes"], 0);
    assert_eq!(report["late_bytes"], 5);
    assert_eq!(report["matched"], true);
}

#[test]
fn loopback_uri_mode_pretty_output() {
    let output = wsstream(&[
        "--format",
        "pretty",
        "loopback",
        "--max-early-data",
        "4",
        "--data",
        "hello world",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("early_bytes=4"), "{stdout}");
    assert!(stdout.contains("matched=true"), "{stdout}");
}

#[test]
fn loopback_rejects_bad_timeout() {
    let output = wsstream(&["loopback", "--timeout", "0s"]);
    assert_eq!(output.status.code(), Some(64));
}
