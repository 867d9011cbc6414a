use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::scoring::DetectionScore;
use crate::types::SearchResult;

/// Writes `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let write_failure = |source| Error::WriteFailure {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_failure)?;
    }
    let encoded = serde_json::to_vec_pretty(value).map_err(|err| write_failure(err.into()))?;
    fs::write(path, encoded).map_err(write_failure)
}

/// Table with columns query_source_id, query_window_start_time,
/// matched_template_id, distance, rank (plus window indices).
pub fn write_results(path: &Path, results: &[SearchResult]) -> Result<()> {
    write_json(path, results)
}

pub fn write_scores(path: &Path, scores: &[DetectionScore]) -> Result<()> {
    write_json(path, scores)
}
