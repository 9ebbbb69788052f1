//! Generates the OpenAPI specification to a JSON file.
//!
//! Run with: cargo run --bin gen-openapi -p bluegate-server
//!
//! The file is written to the workspace root as `openapi.json`.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    println!("Generating OpenAPI specification...\n");

    let json = bluegate_server::api::get_openapi_json()?;

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .context("Could not find workspace root")?;
    let output_path = workspace_root.join("openapi.json");

    fs::write(&output_path, &json)
        .with_context(|| format!("Failed to write to {}", output_path.display()))?;
    println!("Written to: {}", output_path.display());

    let spec: serde_json::Value = serde_json::from_str(&json)?;
    if let Some(paths) = spec.get("paths").and_then(|p| p.as_object()) {
        println!("Paths: {}", paths.len());
    }
    if let Some(schemas) = spec.pointer("/components/schemas").and_then(|s| s.as_object()) {
        println!("Schemas: {}", schemas.len());
    }

    println!("\nOpenAPI specification generated successfully!");
    Ok(())
}
