use std::borrow::Cow;

use anyhow::{ensure, Result};

use crate::types::AudioClip;

/// Sub-windowing policy applied to each clip before embedding
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowPolicy {
    /// Window length in seconds; `None` embeds the whole clip as window 0
    pub length: Option<f64>,
    /// Hop between window starts in seconds; defaults to `length`
    pub stride: Option<f64>,
}

/// A fixed-length slice of a clip, positioned in the source recording
#[derive(Debug, Clone)]
pub struct ClipWindow<'a> {
    pub index: usize,
    pub start_time: f64, // seconds
    pub samples: Cow<'a, [f32]>,
}

impl WindowPolicy {
    pub fn whole_clip() -> Self {
        Self::default()
    }

    pub fn sliding(length: f64, stride: f64) -> Self {
        Self {
            length: Some(length),
            stride: Some(stride),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(length) = self.length {
            check_seconds("window_length", length)?;
        }
        if let Some(stride) = self.stride {
            ensure!(
                self.length.is_some(),
                "window_stride requires window_length"
            );
            check_seconds("window_stride", stride)?;
        }
        Ok(())
    }

    pub fn effective_stride(&self) -> Option<f64> {
        self.stride.or(self.length)
    }

    /// Split `clip` into windows.
    ///
    /// Only full-length windows are produced; a trailing remainder shorter
    /// than one window is dropped. A clip shorter than a single window is
    /// zero-padded into exactly one window.
    pub fn split<'a>(&self, clip: &'a AudioClip) -> Result<Vec<ClipWindow<'a>>> {
        let (Some(length), Some(stride)) = (self.length, self.effective_stride()) else {
            return Ok(vec![ClipWindow {
                index: 0,
                start_time: 0.0,
                samples: Cow::Borrowed(clip.samples.as_slice()),
            }]);
        };

        let window_samples = sample_count("window_length", length, clip.sample_rate)?;
        let stride_samples = sample_count("window_stride", stride, clip.sample_rate)?;
        let total = clip.samples.len();

        if total < window_samples {
            let mut padded = clip.samples.clone();
            padded.resize(window_samples, 0.0);
            return Ok(vec![ClipWindow {
                index: 0,
                start_time: 0.0,
                samples: Cow::Owned(padded),
            }]);
        }

        // total >= window_samples here, so the last start is bounded by total
        let last_start = total - window_samples;
        Ok((0..=last_start / stride_samples)
            .map(|index| {
                let start = index * stride_samples;
                ClipWindow {
                    index,
                    start_time: index as f64 * stride,
                    samples: Cow::Borrowed(&clip.samples[start..start + window_samples]),
                }
            })
            .collect())
    }
}

/// Longest window or stride accepted, in seconds.
pub const MAX_WINDOW_SECONDS: f64 = 600.0;

fn check_seconds(name: &str, seconds: f64) -> Result<()> {
    ensure!(
        seconds.is_finite() && seconds > 0.0,
        "{name} must be positive, got {seconds}"
    );
    ensure!(
        seconds <= MAX_WINDOW_SECONDS,
        "{name} must be at most {MAX_WINDOW_SECONDS} seconds, got {seconds}"
    );
    Ok(())
}

fn sample_count(name: &str, seconds: f64, sample_rate: u32) -> Result<usize> {
    check_seconds(name, seconds)?;
    let samples = (seconds * f64::from(sample_rate)).round();
    ensure!(
        samples <= (isize::MAX as usize / std::mem::size_of::<f32>()) as f64,
        "{name} of {seconds} s at {sample_rate} Hz is too many samples"
    );
    Ok((samples as usize).max(1))
}
