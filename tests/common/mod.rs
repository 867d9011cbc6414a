#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::Path;

use anyhow::{bail, Result};
use callfinder::audio::ClipLoader;
use callfinder::extractor::{EmbedOptions, Embedder};
use callfinder::{AudioClip, EmbeddingRecord};
use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::Array2;

pub const SAMPLE_RATE: u32 = 16_000;

pub fn write_sine_wave(path: &Path, frequency: f32, seconds: f32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let total_samples = (SAMPLE_RATE as f32 * seconds) as usize;
    for index in 0..total_samples {
        let t = index as f32 / SAMPLE_RATE as f32;
        let sample = (f32::sin(2.0 * PI * frequency * t) * 0.5 * i16::MAX as f32) as i16;
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

pub fn record(source: &str, window: usize, vector: &[f32]) -> EmbeddingRecord {
    EmbeddingRecord::new(source, window, window as f64, vector.to_vec())
}

/// Serves synthetic ramps without touching the filesystem.
///
/// Paths whose stem starts with `bad` fail to load; the stem's trailing
/// digits give the clip length in seconds (default 1).
pub struct RampLoader {
    pub sample_rate: u32,
}

impl ClipLoader for RampLoader {
    fn load(&self, path: &Path) -> Result<AudioClip> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if stem.starts_with("bad") {
            bail!("unreadable input {}", path.display());
        }
        let digits: String = stem.chars().filter(|c| c.is_ascii_digit()).collect();
        let seconds: usize = digits.parse().unwrap_or(1);
        let samples = (0..seconds * self.sample_rate as usize)
            .map(|i| (i % 7) as f32 / 7.0)
            .collect();
        Ok(AudioClip::new(
            path.display().to_string(),
            samples,
            self.sample_rate,
        ))
    }
}

/// Two-dimensional embedding: window mean and window length.
pub struct MeanEmbedder {
    pub sample_rate: u32,
    pub calls: std::cell::Cell<usize>,
}

impl MeanEmbedder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            calls: std::cell::Cell::new(0),
        }
    }
}

impl Embedder for MeanEmbedder {
    fn name(&self) -> &str {
        "mean"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn embed(&self, windows: &[&[f32]], options: &EmbedOptions) -> Result<Array2<f32>> {
        assert!(windows.len() <= options.batch_size);
        self.calls.set(self.calls.get() + 1);
        let mut out = Array2::zeros((windows.len(), 2));
        for (mut row, window) in out.rows_mut().into_iter().zip(windows) {
            let mean = window.iter().sum::<f32>() / window.len().max(1) as f32;
            row[0] = mean;
            row[1] = window.len() as f32;
        }
        Ok(out)
    }
}

/// Returns rows of the wrong width.
pub struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn name(&self) -> &str {
        "broken"
    }

    fn dimension(&self) -> usize {
        4
    }

    fn sample_rate(&self) -> u32 {
        100
    }

    fn embed(&self, windows: &[&[f32]], _options: &EmbedOptions) -> Result<Array2<f32>> {
        Ok(Array2::zeros((windows.len(), 3)))
    }
}
