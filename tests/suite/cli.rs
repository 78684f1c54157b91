//! The `ludics` binary end to end.

use std::fs;
use std::process::Command;

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::common::{claim, concede};

fn run_cli(batch: &Value, config: &str) -> (Value, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("batch.json");
    fs::write(&input, batch.to_string()).expect("write batch");
    let config_path = dir.path().join("config.toml");
    let config = config.replace("$DIR", &dir.path().display().to_string());
    fs::write(&config_path, config).expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_ludics"))
        .arg(&input)
        .env("LUDICS_CONFIG", &config_path)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn ludics");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    (json, dir)
}

#[test]
fn batch_file_produces_json_responses() {
    let batch = json!({
        "designs": [claim(), concede()],
        "requests": [
            {"op": "normalize", "positive": "claim", "negative": "concede"},
            {"op": "views", "design": "missing"}
        ]
    });
    let (output, _dir) = run_cli(&batch, "[cache]\nenabled = false\n");

    assert_eq!(output["designs"][0]["status"], "ok");
    assert_eq!(output["designs"][0]["result"]["name"], "claim");
    assert_eq!(output["responses"][0]["result"]["status"], "CONVERGENT");
    assert_eq!(output["responses"][1]["status"], "error");
    assert_eq!(output["responses"][1]["error"]["kind"], "UnknownDesign");
}

#[test]
fn configured_store_is_created() {
    let batch = json!({
        "designs": [claim()],
        "requests": [{"op": "metrics", "design": "claim"}]
    });
    let (output, dir) = run_cli(
        &batch,
        "[engine]\ndefault_fuel = 8\n\n[cache]\nsqlite_path = \"$DIR/store/artifacts.db\"\n",
    );
    assert_eq!(output["responses"][0]["result"]["depth"], 1);
    assert!(dir.path().join("store").join("artifacts.db").exists());
}
