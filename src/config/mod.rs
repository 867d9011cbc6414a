use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::WindowPolicy;
use crate::extractor::EmbedOptions;
use crate::index::Metric;
use crate::scoring::AggregationPolicy;
use crate::store::Precision;

pub const DEFAULT_K: usize = 5;

/// Options recognized by the batch embedding pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchParams {
    /// Windows grouped per embedder invocation
    pub batch_size: usize,
    /// Parallelism hint passed through to the embedder
    pub num_workers: usize,
    /// Sub-window length in seconds; unset embeds whole clips
    pub window_length: Option<f64>,
    /// Hop between sub-windows in seconds; defaults to `window_length`
    pub window_stride: Option<f64>,
    /// Bit-width of persisted vectors (16 or 32)
    pub output_precision: Precision,
    /// Directory receiving one artifact per successful file
    pub output_dir: Option<PathBuf>,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            batch_size: 64,
            num_workers: 1,
            window_length: None,
            window_stride: None,
            output_precision: Precision::Half,
            output_dir: None,
        }
    }
}

impl BatchParams {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be greater than zero");
        ensure!(self.num_workers > 0, "num_workers must be greater than zero");
        self.window_policy().validate()?;
        if let Some(dir) = &self.output_dir {
            ensure!(
                !dir.exists() || dir.is_dir(),
                "output path must be a directory: {:?}",
                dir
            );
        }
        Ok(())
    }

    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            length: self.window_length,
            stride: self.window_stride,
        }
    }

    pub fn embed_options(&self) -> EmbedOptions {
        EmbedOptions {
            batch_size: self.batch_size,
            num_workers: self.num_workers,
        }
    }
}

/// Options for template search and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchParams {
    pub metric: Metric,
    /// Nearest templates returned per query window
    pub k: usize,
    pub aggregation: AggregationPolicy,
    /// Score cutoff; windows at or below it are candidate detections
    pub threshold: Option<f32>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            metric: Metric::Euclidean,
            k: DEFAULT_K,
            aggregation: AggregationPolicy::MinDistance,
            threshold: None,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.k > 0, "k must be greater than zero");
        if let Some(threshold) = self.threshold {
            ensure!(threshold.is_finite(), "threshold must be finite");
        }
        Ok(())
    }
}

/// Runtime configuration parsed from JSON input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub batch: BatchParams,
    pub search: SearchParams,
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        self.batch.validate().context("invalid batch settings")?;
        self.search.validate().context("invalid search settings")?;
        Ok(())
    }

    /// Reads the config from a file, inline JSON, or falls back to defaults.
    pub fn from_sources(path: Option<&Path>, json: Option<&str>) -> Result<Self> {
        if let Some(p) = path {
            let data = fs::read_to_string(p)
                .with_context(|| format!("Failed to read config file {:?}", p))?;
            return Self::parse(&data);
        }
        if let Some(raw) = json {
            return Self::parse(raw);
        }
        Ok(Self::default())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse config JSON")
    }
}
