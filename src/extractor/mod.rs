//! Embedding model boundary.
//!
//! Any acoustic model that turns fixed-length windows of mono PCM into
//! fixed-length vectors can drive the pipeline by implementing [`Embedder`].

mod spectral;
mod statistics;

use anyhow::Result;
use ndarray::Array2;

pub use spectral::SpectralEmbedder;

/// Throughput hints forwarded to the model on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedOptions {
    /// Windows grouped per model invocation
    pub batch_size: usize,
    /// Parallelism the model may use internally
    pub num_workers: usize,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            num_workers: 1,
        }
    }
}

pub trait Embedder {
    /// Short identifier recorded in logs.
    fn name(&self) -> &str;

    /// Length of every produced vector.
    fn dimension(&self) -> usize;

    /// Rate the windows must be sampled at.
    fn sample_rate(&self) -> u32;

    /// Embeds each window; row `i` of the result belongs to `windows[i]`.
    fn embed(&self, windows: &[&[f32]], options: &EmbedOptions) -> Result<Array2<f32>>;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn embed(&self, windows: &[&[f32]], options: &EmbedOptions) -> Result<Array2<f32>> {
        (**self).embed(windows, options)
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn embed(&self, windows: &[&[f32]], options: &EmbedOptions) -> Result<Array2<f32>> {
        (**self).embed(windows, options)
    }
}
