use anyhow::{Context, Result};
use base64::Engine;
use docflow_core::ExecutionState;
use docflow_sdk::{ConversionResult, OcrResult};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Write the execution state as pretty JSON. The file always gets a `.json` extension.
pub fn save_state(path: &Path, state: &ExecutionState) -> Result<PathBuf> {
    let path = json_path(path);
    create_parent(&path)?;
    write_json(path, state)
}

/// Write each part of a conversion next to `path`, one extension per part.
///
/// Images land in the same directory under their own (base) names.
pub fn save_conversion(path: &Path, result: &ConversionResult) -> Result<Vec<PathBuf>> {
    create_parent(path)?;
    let mut written = Vec::new();

    if let Some(markdown) = &result.markdown {
        written.push(write_file(path.with_extension("md"), markdown.as_bytes())?);
    }
    if let Some(html) = &result.html {
        written.push(write_file(path.with_extension("html"), html.as_bytes())?);
    }
    if let Some(json) = &result.json {
        written.push(write_json(path.with_extension("json"), json)?);
    }
    if let Some(chunks) = &result.chunks {
        written.push(write_json(path.with_extension("chunks.json"), chunks)?);
    }
    if let Some(extraction) = &result.extraction_schema_json {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = path.with_file_name(format!("{}_extraction_results.json", stem));
        written.push(write_file(target, extraction.as_bytes())?);
    }
    if let Some(metadata) = &result.metadata {
        written.push(write_json(path.with_extension("metadata.json"), metadata)?);
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    for (name, data) in result.images.iter().flatten() {
        let Some(file_name) = Path::new(name).file_name() else {
            tracing::warn!(image = %name, "Skipping image without a file name");
            continue;
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .with_context(|| format!("Image {} is not valid base64", name))?;
        written.push(write_file(dir.join(file_name), &bytes)?);
    }

    Ok(written)
}

/// Write the recognised text as `.txt` and the full response as `.ocr.json`.
pub fn save_ocr(path: &Path, result: &OcrResult) -> Result<Vec<PathBuf>> {
    create_parent(path)?;
    Ok(vec![
        write_file(path.with_extension("txt"), result.text().as_bytes())?,
        write_json(path.with_extension("ocr.json"), result)?,
    ])
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn write_file(path: PathBuf, contents: &[u8]) -> Result<PathBuf> {
    std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Output saved");
    Ok(path)
}

fn write_json(path: PathBuf, value: &impl Serialize) -> Result<PathBuf> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_file(path, content.as_bytes())
}

fn json_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("json") => path.to_path_buf(),
        _ => path.with_extension("json"),
    }
}

pub fn print_state(state: &ExecutionState) {
    println!("Execution status:");
    if let Some(id) = state.execution_id {
        println!("  Execution ID: {}", id);
    }
    if let Some(id) = state.workflow_id {
        println!("  Workflow ID: {}", id);
    }
    println!("  Status: {}", state.status);
    if let Some(created) = state.created {
        println!("  Created: {}", created);
    }
    if let Some(updated) = state.updated {
        println!("  Updated: {}", updated);
    }
    if let Some(error) = &state.error {
        println!("  Error: {}", error);
    }

    if let Some(result) = &state.result {
        match result.as_object() {
            Some(steps) => {
                println!("\n  Step results:");
                for (name, data) in steps {
                    println!("\n  [{}]", name);
                    let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
                    for line in pretty.lines() {
                        println!("      {}", line);
                    }
                }
            }
            None => println!("  Result: {}", result),
        }
    }
}
