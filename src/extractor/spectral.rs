use anyhow::{anyhow, ensure, Context, Result};
use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use aus::WindowType;
use ndarray::Array2;
use tracing::debug;

use super::statistics::{array_from_vec2, column_mean, compute_deltas, mean_and_std};
use super::{EmbedOptions, Embedder};

pub(crate) const TARGET_SAMPLE_RATE: u32 = 16_000;
pub(crate) const WINDOW_MS: usize = 25;
pub(crate) const HOP_MS: usize = 10;
pub(crate) const MEL_BANDS: usize = 32;
pub(crate) const MFCC_COUNT: usize = 13;
const MIN_FREQ: f64 = 50.0;
const MEL_FLOOR: f64 = 1e-10;

/// Deterministic embedding built from mel/MFCC summary statistics.
///
/// Layout: MFCC mean, MFCC std, delta mean, delta std, log-mel mean.
#[derive(Debug, Clone)]
pub struct SpectralEmbedder {
    sample_rate: u32,
    fft_size: usize,
    hop_size: usize,
}

impl SpectralEmbedder {
    pub fn new() -> Self {
        Self::with_sample_rate(TARGET_SAMPLE_RATE)
    }

    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            fft_size: ((sample_rate as usize * WINDOW_MS) / 1000).max(2),
            hop_size: ((sample_rate as usize * HOP_MS) / 1000).max(1),
        }
    }

    fn embed_window(&self, window: &[f32]) -> Result<Vec<f32>> {
        ensure!(!window.is_empty(), "cannot embed an empty window");
        let mut audio: Vec<f64> = window.iter().map(|&s| s as f64).collect();
        if audio.len() < self.fft_size {
            audio.resize(self.fft_size, 0.0);
        }

        let stft = spectrum::rstft(&audio, self.fft_size, self.hop_size, WindowType::Hanning);
        let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
        let power = analysis::make_power_spectrogram(&magnitude);

        let freqs = spectrum::rfftfreq(self.fft_size, self.sample_rate);
        let filterbank = MelFilterbank::new(
            MIN_FREQ,
            (self.sample_rate as f64) / 2.0,
            MEL_BANDS,
            &freqs,
            true,
        );
        let mut mel = analysis::mel::make_mel_spectrogram(&power, &filterbank);
        for frame in mel.iter_mut() {
            for value in frame.iter_mut() {
                *value = value.max(MEL_FLOOR);
            }
        }
        ensure!(!mel.is_empty(), "window produced no spectral frames");

        let mfcc = array_from_vec2(&analysis::mel::mfcc_spectrogram(&mel, MFCC_COUNT, None));
        let deltas = compute_deltas(&mfcc);
        let log_mel = array_from_vec2(&mel).mapv(f32::ln);

        let mut vector = Vec::with_capacity(self.dimension());
        vector.extend(mean_and_std(&mfcc));
        vector.extend(mean_and_std(&deltas));
        vector.extend(column_mean(&log_mel));
        ensure!(
            vector.len() == self.dimension(),
            "spectral summary has {} values, expected {}",
            vector.len(),
            self.dimension()
        );
        ensure!(
            vector.iter().all(|v| v.is_finite()),
            "spectral summary contains non-finite values"
        );
        Ok(vector)
    }

    fn embed_serial(&self, windows: &[&[f32]]) -> Result<Vec<Vec<f32>>> {
        windows
            .iter()
            .enumerate()
            .map(|(idx, window)| {
                self.embed_window(window)
                    .with_context(|| format!("failed to embed window {idx}"))
            })
            .collect()
    }
}

impl Default for SpectralEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for SpectralEmbedder {
    fn name(&self) -> &str {
        "spectral-summary"
    }

    fn dimension(&self) -> usize {
        4 * MFCC_COUNT + MEL_BANDS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn embed(&self, windows: &[&[f32]], options: &EmbedOptions) -> Result<Array2<f32>> {
        let workers = options.num_workers.clamp(1, windows.len().max(1));
        debug!(windows = windows.len(), workers, "embedding batch");

        let rows = if workers == 1 {
            self.embed_serial(windows)?
        } else {
            let per_worker = windows.len().div_ceil(workers);
            std::thread::scope(|scope| {
                let handles: Vec<_> = windows
                    .chunks(per_worker)
                    .map(|chunk| scope.spawn(move || self.embed_serial(chunk)))
                    .collect();
                let mut rows = Vec::with_capacity(windows.len());
                for handle in handles {
                    let part = handle
                        .join()
                        .map_err(|_| anyhow!("embedding worker panicked"))??;
                    rows.extend(part);
                }
                Ok::<_, anyhow::Error>(rows)
            })?
        };

        let dimension = self.dimension();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((windows.len(), dimension), flat)
            .context("spectral embeddings have inconsistent shape")
    }
}
