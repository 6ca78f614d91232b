// Common test utilities and fixtures

use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Write `contents` as `batch.json` inside `dir`
pub fn write_batch(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("batch.json");
    std::fs::write(&path, contents).expect("Failed to write batch file");
    path
}

/// Run drawfetch and return (stdout, stderr, exit code)
pub fn run_command(args: &[&str]) -> Result<(String, String, i32)> {
    let output = Command::new(env!("CARGO_BIN_EXE_drawfetch"))
        .args(args)
        .env("RUST_LOG", "drawfetch=warn")
        .output()?;

    Ok((
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    ))
}

/// Parse every non-empty stdout line as JSON
#[allow(dead_code)]
pub fn json_lines(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("stdout line is not JSON"))
        .collect()
}

/// Batch files used across tests
pub mod fixtures {
    pub const TWO_PRODUCTS: &str = r#"{
        "target_url": "https://www.example.com/product-finder",
        "products": [
            { "name": "ARISE", "specs": { "载重(kg)": "1000", "速度(m/s)": "1.75" } },
            { "name": "Gen3" }
        ]
    }"#;

    #[allow(dead_code)]
    pub const BAD_URL: &str = r#"{
        "target_url": "not a url",
        "products": [ { "name": "ARISE" } ]
    }"#;

    #[allow(dead_code)]
    pub const UNKNOWN_SETTING: &str = r#"{
        "target_url": "https://www.example.com/product-finder",
        "products": [],
        "download_settings": { "max_retries": 3 }
    }"#;
}
