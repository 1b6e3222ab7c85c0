use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use framekit_core::{DEFAULT_GENERATED_AT, DecodeOptions, Protocol, decode_file};

fn main() -> ExitCode {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<(), String> {
    let root = PathBuf::from("tests").join("golden");
    let entries =
        fs::read_dir(&root).map_err(|err| format!("failed to read {}: {}", root.display(), err))?;

    for entry in entries {
        let entry = entry.map_err(|err| format!("failed to read entry: {}", err))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let protocol = path.join("protocol.json");
        let input = path.join("input.hex");
        if !protocol.exists() || !input.exists() {
            continue;
        }
        let output = path.join("expected_report.json");
        regenerate_one(&protocol, &input, &output)?;
    }

    Ok(())
}

fn regenerate_one(protocol: &Path, input: &Path, output: &Path) -> Result<(), String> {
    let json = fs::read_to_string(protocol)
        .map_err(|err| format!("failed to read {}: {}", protocol.display(), err))?;
    let protocol = Protocol::from_json(&json)
        .map_err(|err| format!("invalid protocol {}: {}", protocol.display(), err))?;
    let mut report = decode_file(Arc::new(protocol), input, DecodeOptions::default())
        .map_err(|err| format!("decode failed for {}: {}", input.display(), err))?;
    report.generated_at = DEFAULT_GENERATED_AT.to_string();
    let json = serde_json::to_string(&report)
        .map_err(|err| format!("JSON serialization failed: {}", err))?;
    fs::write(output, json)
        .map_err(|err| format!("failed to write {}: {}", output.display(), err))?;
    Ok(())
}
