//! Batch embedding of many audio files with per-file failure isolation.
//!
//! Files are processed one at a time, in input order. Whatever goes wrong
//! with a single file (unreadable input, decode error, model error, output
//! write error) is captured in that file's [`ProcessingOutcome`] and the
//! loop moves on. A finished run always accounts for every input.

mod summary;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use tracing::{debug, info, warn};

use crate::audio::ClipLoader;
use crate::collection::EmbeddingCollection;
use crate::config::BatchParams;
use crate::extractor::Embedder;
use crate::store;
use crate::types::{EmbeddingRecord, ProcessingOutcome};

pub use summary::RunSummary;

/// Incremental progress reported after each file.
#[derive(Debug, Clone)]
pub struct BatchProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub source_id: &'a str,
    pub succeeded: bool,
}

/// Everything a batch run produced.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub collection: EmbeddingCollection,
    pub summary: RunSummary,
}

impl BatchRun {
    pub fn outcomes(&self) -> &[ProcessingOutcome] {
        &self.summary.outcomes
    }

    pub fn elapsed(&self) -> Duration {
        self.summary.elapsed
    }
}

pub struct BatchPipeline<L, E> {
    loader: L,
    embedder: E,
    params: BatchParams,
}

impl<L: ClipLoader, E: Embedder> BatchPipeline<L, E> {
    /// Fails only on structurally invalid parameters.
    pub fn new(loader: L, embedder: E, params: BatchParams) -> Result<Self> {
        params.validate().context("invalid batch parameters")?;
        Ok(Self {
            loader,
            embedder,
            params,
        })
    }

    pub fn params(&self) -> &BatchParams {
        &self.params
    }

    pub fn run<P: AsRef<Path>>(&self, files: &[P]) -> BatchRun {
        self.run_with_progress(files, |_| {})
    }

    pub fn run_with_progress<P, F>(&self, files: &[P], mut observer: F) -> BatchRun
    where
        P: AsRef<Path>,
        F: FnMut(&BatchProgress<'_>),
    {
        let started = Instant::now();
        let total = files.len();
        info!(
            files = total,
            embedder = self.embedder.name(),
            batch_size = self.params.batch_size,
            num_workers = self.params.num_workers,
            "starting batch embedding run"
        );

        let mut collection = EmbeddingCollection::new();
        let mut outcomes = Vec::with_capacity(total);
        let mut artifacts: HashMap<PathBuf, String> = HashMap::new();

        for (idx, file) in files.iter().enumerate() {
            let path = file.as_ref();
            let source_id = path.display().to_string();
            debug!(file = %source_id, position = idx + 1, total, "processing file");

            let processed = self.process_file(path, &source_id, &collection, &mut artifacts);
            let outcome = match processed {
                Ok(records) => {
                    let windows = records.len();
                    match collection.extend(records) {
                        Ok(()) => {
                            info!(file = %source_id, windows, "embedded file");
                            ProcessingOutcome::success(&source_id, windows)
                        }
                        Err(err) => {
                            warn!(file = %source_id, error = %err, "file rejected");
                            ProcessingOutcome::failed(&source_id, err.to_string())
                        }
                    }
                }
                Err(err) => {
                    let reason = format!("{err:#}");
                    warn!(file = %source_id, error = %reason, "file failed");
                    ProcessingOutcome::failed(&source_id, reason)
                }
            };

            observer(&BatchProgress {
                completed: idx + 1,
                total,
                elapsed: started.elapsed(),
                source_id: &source_id,
                succeeded: outcome.status.is_success(),
            });
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            outcomes,
            elapsed: started.elapsed(),
        };
        info!(
            succeeded = summary.successes(),
            failed = summary.failures(),
            records = collection.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "batch embedding run complete"
        );
        BatchRun {
            collection,
            summary,
        }
    }

    fn process_file(
        &self,
        path: &Path,
        source_id: &str,
        collection: &EmbeddingCollection,
        artifacts: &mut HashMap<PathBuf, String>,
    ) -> Result<Vec<EmbeddingRecord>> {
        let clip = self
            .loader
            .load(path)
            .with_context(|| format!("failed to load audio from {}", path.display()))?;
        ensure!(
            clip.sample_rate == self.embedder.sample_rate(),
            "clip sample rate {} Hz does not match embedder rate {} Hz",
            clip.sample_rate,
            self.embedder.sample_rate()
        );
        ensure!(!clip.samples.is_empty(), "clip contains no samples");

        let windows = self.params.window_policy().split(&clip)?;
        let options = self.params.embed_options();
        let dimension = self.embedder.dimension();
        let mut records = Vec::with_capacity(windows.len());

        for batch in windows.chunks(self.params.batch_size) {
            let views: Vec<&[f32]> = batch.iter().map(|w| &*w.samples).collect();
            let matrix = self
                .embedder
                .embed(&views, &options)
                .with_context(|| format!("{} inference failed", self.embedder.name()))?;
            ensure!(
                matrix.nrows() == batch.len(),
                "embedder returned {} rows for {} windows",
                matrix.nrows(),
                batch.len()
            );
            ensure!(
                matrix.ncols() == dimension,
                "embedder returned {} columns, expected {}",
                matrix.ncols(),
                dimension
            );
            for (window, row) in batch.iter().zip(matrix.rows()) {
                ensure!(
                    row.iter().all(|v| v.is_finite()),
                    "embedder produced non-finite values for window {}",
                    window.index
                );
                records.push(EmbeddingRecord::new(
                    source_id,
                    window.index,
                    window.start_time,
                    row.to_vec(),
                ));
            }
        }

        collection.check_insertable(&records)?;

        if let Some(dir) = &self.params.output_dir {
            let destination = store::artifact_path(dir, path);
            if let Some(previous) = artifacts.get(&destination) {
                warn!(
                    file = %source_id,
                    previous = %previous,
                    artifact = %destination.display(),
                    "artifact name collides with an earlier file; overwriting"
                );
            }
            let part = EmbeddingCollection::from_records(records.iter().cloned())?;
            store::save(&part, &destination, self.params.output_precision)?;
            artifacts.insert(destination, source_id.to_string());
        }

        Ok(records)
    }
}
