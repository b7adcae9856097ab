use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::{FluorescenceRequest, TreatmentRequest};
use crate::{cli::BatchOperation, dosimetry, fluorescence};

const RESULT_SUFFIX: &str = ".result.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Evaluates every `*.json` request under `dir` and writes `<stem>.result.json` beside it.
pub fn process_directory(dir: &Path, operation: BatchOperation) -> Result<BatchSummary> {
    info!(directory = ?dir, ?operation, "Processing directory");

    let files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| is_request_file(p))
        .collect();

    info!(count = files.len(), "Found request files");

    let failed: usize = files
        .par_iter()
        .map(|path| match process_file(path, operation) {
            Ok(output) => {
                info!(input = ?path, output = ?output, "Evaluated request");
                0
            }
            Err(e) => {
                warn!(input = ?path, error = %e, "Failed to evaluate request");
                1
            }
        })
        .sum();

    Ok(BatchSummary {
        processed: files.len() - failed,
        failed,
    })
}

/// Evaluates one request file and returns the path of the written result.
pub fn process_file(path: &Path, operation: BatchOperation) -> Result<PathBuf> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

    let output = match operation {
        BatchOperation::Treatment => {
            let request: TreatmentRequest =
                serde_json::from_str(&text).context("Invalid treatment request")?;
            serde_json::to_string_pretty(&dosimetry::calculate_treatment(&request)?)?
        }
        BatchOperation::Fluorescence => {
            let request: FluorescenceRequest =
                serde_json::from_str(&text).context("Invalid fluorescence request")?;
            serde_json::to_string_pretty(&fluorescence::analyze_fluorescence(&request)?)?
        }
    };

    let output_path = result_path(path);
    fs::write(&output_path, output)
        .with_context(|| format!("Failed to write {:?}", output_path))?;
    Ok(output_path)
}

fn is_request_file(path: &Path) -> bool {
    let is_json = path.extension().map_or(false, |ext| ext == "json");
    let is_result = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.ends_with(RESULT_SUFFIX));
    path.is_file() && is_json && !is_result
}

fn result_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("request");
    path.with_file_name(format!("{}{}", stem, RESULT_SUFFIX))
}
