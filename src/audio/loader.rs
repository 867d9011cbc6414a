use std::path::Path;

use anyhow::{Context, Result};

use super::decoder::decode_audio;
use super::resample::linear_resample;
use crate::types::AudioClip;

/// Source of decoded clips for the batch pipeline.
pub trait ClipLoader {
    fn load(&self, path: &Path) -> Result<AudioClip>;
}

/// Decodes any symphonia-supported container and resamples to a fixed rate.
#[derive(Debug, Clone, Copy)]
pub struct DecodingLoader {
    target_rate: u32,
}

impl DecodingLoader {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }
}

impl ClipLoader for DecodingLoader {
    fn load(&self, path: &Path) -> Result<AudioClip> {
        let decoded = decode_audio(path)?;
        let samples = if decoded.sample_rate == self.target_rate {
            decoded.samples
        } else {
            linear_resample(&decoded.samples, decoded.sample_rate, self.target_rate)
                .with_context(|| {
                    format!(
                        "failed to resample audio from {} Hz to {} Hz",
                        decoded.sample_rate, self.target_rate
                    )
                })?
        };
        Ok(AudioClip::new(
            path.display().to_string(),
            samples,
            self.target_rate,
        ))
    }
}

impl<L: ClipLoader + ?Sized> ClipLoader for &L {
    fn load(&self, path: &Path) -> Result<AudioClip> {
        (**self).load(path)
    }
}
