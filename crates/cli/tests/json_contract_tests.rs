// Integration tests enforcing the --json stdout contract.
//
// stdout from --json commands must be exactly one JSON value with a stable
// shape; human-readable text goes to stderr.
//
// Run with: cargo test -p rekap-cli --test json_contract_tests -- --nocapture

use std::fs;
use std::process::Command;

use httpmock::prelude::*;
use serde_json::json;

fn rekap(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rekap"));
    cmd.current_dir(dir)
        .env("REKAP_CONFIG", dir.join("settings.json"))
        .env_remove("REKAP_LOG")
        .arg("--store")
        .arg(dir.join("data_akademik.csv"));
    cmd
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");

    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be valid JSON.\nParse error: {}\nstdout:\n{}", e, trimmed))
}

#[test]
fn show_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("data_akademik.csv"), "id,name,score,remark,kelas\n101,Andi,80,,A\n102,,,,B\n").unwrap();

    let output = rekap(dir.path()).args(["show", "--json"]).output().unwrap();
    assert!(output.status.success());

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["count"], 2);
    assert_eq!(
        val["records"],
        json!([
            { "id": "101", "name": "Andi", "score": 80.0, "remark": "", "extra": { "kelas": "A" } },
            { "id": "102", "remark": "", "extra": { "kelas": "B" } }
        ])
    );
}

#[test]
fn show_json_on_missing_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let output = rekap(dir.path()).args(["show", "--json"]).output().unwrap();
    assert!(output.status.success());

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["count"], 0);
    assert_eq!(val["records"], json!([]));
}

#[test]
fn submit_json_success_shape() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(json!({
            "message": { "role": "assistant", "content": "{\"data\": [{\"nim\": \"101\"}, {\"nim\": \"string\"}]}" }
        }));
    });

    let output = rekap(dir.path())
        .args(["--provider", "local", "--endpoint", &server.base_url(), "submit", "--json", "Andi 101"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["status"], "success");
    assert_eq!(val["outcome"], json!({ "added": 1, "updated": 0, "skipped": 0, "unchanged": 0 }));
    assert_eq!(val["extracted"], 1);
    assert_eq!(val["rejected"], 1);
    assert_eq!(val["warnings"], json!([]));
}

#[test]
fn submit_json_failure_still_single_value() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(json!({
            "message": { "role": "assistant", "content": "{\"data\": []}" }
        }));
    });

    let output = rekap(dir.path())
        .args(["--provider", "local", "--endpoint", &server.base_url(), "submit", "--json", "halo"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["status"], "failure");
    assert!(val["error"].as_str().unwrap().contains("no student record"));
    assert!(val.get("outcome").is_none());
}

#[test]
fn doctor_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let output = rekap(dir.path())
        .args(["--provider", "local", "--model", "qwen2.5", "ai", "doctor", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["schema_version"], 1);
    assert_eq!(val["status"], "ready");
    assert_eq!(val["provider"], "local");
    assert_eq!(val["model"], "qwen2.5");
    assert_eq!(val["endpoint"], "http://localhost:11434");
    assert_eq!(val["test"], "skipped");
}
