// tests/cli.rs
use std::path::Path;
use std::process::{Command, Output};

fn write_dump(dir: &Path, user_states: &str) -> String {
    let path = dir.join("state.json");
    std::fs::write(
        &path,
        format!(r#"{{"exchange": {{"spot_clearinghouse": {{"user_states": {user_states}}}}}}}"#),
    )
    .unwrap();
    path.to_str().unwrap().to_string()
}

fn hypesnap(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hypesnap")).args(args).output().unwrap()
}

const THREE_RECORDS: &str = r#"[
    ["0xA", {"b": [[150, {"t": "100.5"}]]}],
    ["0xB", {"b": [[150, {"t": "200.0"}]]}],
    ["0xC", {"b": [[99, {"t": "999"}]]}]
]"#;

#[test]
fn balances_run_succeeds() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_dump(tmp.path(), THREE_RECORDS);
    let out_path = tmp.path().join("balances.json");

    let output = hypesnap(&[
        "--input",
        &input,
        "--output",
        out_path.to_str().unwrap(),
        "--top-n",
        "10",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(
        written,
        serde_json::json!([
            {"address": "0xB", "balance": "200.0"},
            {"address": "0xA", "balance": "100.5"}
        ])
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Saved top 2 entries (from 2 total)"));
}

#[test]
fn all_writes_merkle_files() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_dump(tmp.path(), THREE_RECORDS);
    let config_path = tmp.path().join("hypesnap.toml");
    std::fs::write(
        &config_path,
        format!(
            "input-path = {:?}\noutput-path = {:?}\n\n[merkle]\nroot-path = {:?}\nproofs-path = {:?}\n",
            input,
            tmp.path().join("balances.json").to_str().unwrap(),
            tmp.path().join("root.json").to_str().unwrap(),
            tmp.path().join("proofs.json").to_str().unwrap(),
        ),
    )
    .unwrap();

    let output = hypesnap(&["--config", config_path.to_str().unwrap(), "all"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(tmp.path().join("root.json").exists());
    assert!(tmp.path().join("proofs.json").exists());
}

#[test]
fn malformed_balance_exits_non_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_dump(tmp.path(), r#"[["0xA", {"b": [[150, {"t": "abc"}]]}]]"#);
    let out_path = tmp.path().join("balances.json");

    let output = hypesnap(&["--input", &input, "--output", out_path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("abc"));
    // Captured stderr is not a terminal, so no colour codes
    assert!(!stderr.contains('\x1b'), "stderr: {stderr:?}");
    assert!(!out_path.exists());
}

#[test]
fn missing_input_exits_non_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("absent.json");
    let out_path = tmp.path().join("balances.json");

    let output = hypesnap(&[
        "--input",
        missing.to_str().unwrap(),
        "--output",
        out_path.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.json"));
}

#[test]
fn top_n_from_environment() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_dump(tmp.path(), THREE_RECORDS);
    let out_path = tmp.path().join("balances.json");

    let output = Command::new(env!("CARGO_BIN_EXE_hypesnap"))
        .args(["--input", &input, "--output", out_path.to_str().unwrap()])
        .env("HYPESNAP_TOP_N", "1")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Saved top 1 entries (from 2 total)"));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written, serde_json::json!([{"address": "0xB", "balance": "200.0"}]));
}

#[test]
fn zero_top_n_exits_non_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_dump(tmp.path(), THREE_RECORDS);

    let output = hypesnap(&["--input", &input, "--top-n", "0"]);

    assert_eq!(output.status.code(), Some(1));
}
