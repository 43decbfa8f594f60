use anyhow::{Context, Result};
use chrono::TimeZone;
use std::env;
use std::fs;
use std::process::Command;
use vergen_gitcl::{Emitter, GitclBuilder};

fn main() -> Result<()> {
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    // Reproducible builds pin the timestamp
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => {
            let secs = val.parse::<i64>().context("invalid SOURCE_DATE_EPOCH")?;
            chrono::Utc
                .timestamp_opt(secs, 0)
                .single()
                .context("SOURCE_DATE_EPOCH out of range")?
        }
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let mkv_version = mkv_version_from_metadata()
        .or_else(|_| mkv_version_fallback())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=MKV_VERSION={mkv_version}");

    println!("cargo:rerun-if-changed=mkv/Cargo.toml");

    Ok(())
}

/// Looks up the `mkv` package version through `cargo metadata`.
fn mkv_version_from_metadata() -> Result<String> {
    let output = Command::new("cargo")
        .args(["metadata", "--format-version", "1"])
        .output()?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    metadata["packages"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|package| package["name"].as_str() == Some("mkv"))
        .and_then(|package| package["version"].as_str())
        .map(str::to_string)
        .context("mkv package not found in metadata")
}

fn mkv_version_fallback() -> Result<String> {
    let manifest = fs::read_to_string("mkv/Cargo.toml")?;

    manifest
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("version"))
        .find_map(|line| line.split_once('='))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .context("could not find version in mkv/Cargo.toml")
}
