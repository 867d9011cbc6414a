//! On-disk representation of embedding collections.
//!
//! One JSON artifact holds a table of rows keyed by (source, window). Values
//! are reduced to the declared precision exactly once, inside [`save`], and
//! are written as numbers that parse back to the identical `f32`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use half::f16;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collection::EmbeddingCollection;
use crate::error::{Error, Result};
use crate::types::EmbeddingRecord;

pub const ARTIFACT_SUFFIX: &str = "_embeddings.json";
const FORMAT_VERSION: u32 = 1;

/// Bit-width of persisted vector values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Precision {
    #[default]
    Half,
    Single,
}

impl Precision {
    pub fn bits(self) -> u8 {
        match self {
            Precision::Half => 16,
            Precision::Single => 32,
        }
    }

    /// Rounds `value` to this precision. Applying it twice changes nothing.
    pub fn reduce(self, value: f32) -> f32 {
        match self {
            Precision::Half => f16::from_f32(value).to_f32(),
            Precision::Single => value,
        }
    }

    pub fn reduce_vector(self, values: &[f32]) -> Vec<f32> {
        values.iter().map(|&v| self.reduce(v)).collect()
    }

    fn is_representable(self, value: f32) -> bool {
        value.is_finite() && self.reduce(value).to_bits() == value.to_bits()
    }
}

impl TryFrom<u8> for Precision {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        match bits {
            16 => Ok(Precision::Half),
            32 => Ok(Precision::Single),
            other => Err(format!("unsupported output precision {other}; use 16 or 32")),
        }
    }
}

impl From<Precision> for u8 {
    fn from(precision: Precision) -> Self {
        precision.bits()
    }
}

impl EmbeddingCollection {
    /// Copy of this collection with every vector reduced to `precision`.
    pub fn reduced(&self, precision: Precision) -> EmbeddingCollection {
        self.map_vectors(|vector| precision.reduce_vector(vector))
    }
}

#[derive(Serialize, Deserialize)]
struct Artifact {
    format_version: u32,
    precision: Precision,
    dimension: usize,
    rows: Vec<ArtifactRow>,
}

#[derive(Serialize, Deserialize)]
struct ArtifactRow {
    source_id: String,
    window_index: usize,
    window_start_time: f64,
    // f64 so the decimal text round-trips without a second rounding step
    values: Vec<f64>,
}

/// Deterministic artifact location for `source` inside `dir`.
///
/// Only the file stem is used, so equal stems from different folders map
/// to the same artifact.
pub fn artifact_path(dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("unnamed");
    dir.join(format!("{stem}{ARTIFACT_SUFFIX}"))
}

/// Writes `collection` to `path`, reducing values to `precision`.
pub fn save(collection: &EmbeddingCollection, path: &Path, precision: Precision) -> Result<()> {
    let write_failure = |source| Error::WriteFailure {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_failure)?;
    }

    let mut rows = Vec::with_capacity(collection.len());
    for record in collection {
        let values = precision.reduce_vector(&record.vector);
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(Error::format(
                path,
                format!(
                    "{} window {} has value {bad} at {}-bit precision",
                    record.source_id,
                    record.window_index,
                    precision.bits()
                ),
            ));
        }
        rows.push(ArtifactRow {
            source_id: record.source_id.clone(),
            window_index: record.window_index,
            window_start_time: record.window_start_time,
            values: values.into_iter().map(f64::from).collect(),
        });
    }
    let artifact = Artifact {
        format_version: FORMAT_VERSION,
        precision,
        dimension: collection.dimension().unwrap_or(0),
        rows,
    };
    let encoded = serde_json::to_vec(&artifact).map_err(|err| write_failure(err.into()))?;
    fs::write(path, encoded).map_err(write_failure)?;
    debug!(
        path = %path.display(),
        rows = collection.len(),
        bits = precision.bits(),
        "saved embedding artifact"
    );
    Ok(())
}

/// Reads one artifact written by [`save`].
pub fn load(path: &Path) -> Result<EmbeddingCollection> {
    let raw = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::format(path, err.to_string()),
    })?;
    let artifact: Artifact =
        serde_json::from_str(&raw).map_err(|err| Error::format(path, err.to_string()))?;
    if artifact.format_version != FORMAT_VERSION {
        return Err(Error::format(
            path,
            format!("unsupported format version {}", artifact.format_version),
        ));
    }

    let mut collection = EmbeddingCollection::new();
    for (row_idx, row) in artifact.rows.into_iter().enumerate() {
        if row.values.len() != artifact.dimension {
            return Err(Error::format(
                path,
                format!(
                    "row {row_idx} has {} values, expected {}",
                    row.values.len(),
                    artifact.dimension
                ),
            ));
        }
        let values: Vec<f32> = row.values.iter().map(|&v| v as f32).collect();
        if let Some((value, _)) = row
            .values
            .iter()
            .zip(&values)
            .find(|&(&wide, &narrow)| {
                f64::from(narrow) != wide || !artifact.precision.is_representable(narrow)
            })
        {
            return Err(Error::format(
                path,
                format!(
                    "row {row_idx} value {value} is not a {}-bit float",
                    artifact.precision.bits()
                ),
            ));
        }
        collection
            .insert(EmbeddingRecord::new(
                row.source_id,
                row.window_index,
                row.window_start_time,
                values,
            ))
            .map_err(|err| Error::format(path, err.to_string()))?;
    }
    Ok(collection)
}

/// Loads and concatenates every artifact in `dir`, ordered by file name.
pub fn load_dir(dir: &Path) -> Result<EmbeddingCollection> {
    let entries = fs::read_dir(dir).map_err(|err| match err.kind() {
        ErrorKind::NotFound => Error::NotFound(dir.to_path_buf()),
        _ => Error::format(dir, err.to_string()),
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| Error::format(dir, err.to_string()))?.path();
        let is_artifact = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(ARTIFACT_SUFFIX));
        if is_artifact && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut merged = EmbeddingCollection::new();
    for path in &paths {
        let part = load(path)?;
        merged
            .merge(part)
            .map_err(|err| Error::format(path, err.to_string()))?;
    }
    debug!(dir = %dir.display(), artifacts = paths.len(), rows = merged.len(), "loaded artifacts");
    Ok(merged)
}

/// Loads either a single artifact file or a directory of artifacts.
pub fn load_any(path: &Path) -> Result<EmbeddingCollection> {
    if path.is_dir() {
        load_dir(path)
    } else {
        load(path)
    }
}
