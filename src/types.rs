//! Core types shared by the embedding pipeline and the search engine

use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Decoded audio for one source (mono, f32 samples)
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Identifier of the originating file
    pub source_id: String,
    /// Audio samples, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 16000)
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(source_id: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            source_id: source_id.into(),
            samples,
            sample_rate,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Unique key of a record within a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub source_id: String,
    pub window_index: usize,
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.source_id, self.window_index)
    }
}

/// One embedding vector for one window of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub source_id: String,
    pub window_index: usize,
    /// Offset in seconds from the start of the source clip
    pub window_start_time: f64,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(
        source_id: impl Into<String>,
        window_index: usize,
        window_start_time: f64,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            window_index,
            window_start_time,
            vector,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            source_id: self.source_id.clone(),
            window_index: self.window_index,
        }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Result of processing a single input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Embedded successfully, producing `windows` records
    Success { windows: usize },
    /// Any per-file failure, rendered as text
    Failed(String),
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success { .. })
    }
}

impl Display for OutcomeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success { .. } => write!(f, "Success"),
            OutcomeStatus::Failed(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub source_id: String,
    pub status: OutcomeStatus,
}

impl ProcessingOutcome {
    pub fn success(source_id: impl Into<String>, windows: usize) -> Self {
        Self {
            source_id: source_id.into(),
            status: OutcomeStatus::Success { windows },
        }
    }

    pub fn failed(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            status: OutcomeStatus::Failed(reason.into()),
        }
    }
}

/// One ranked match between a query window and a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query_source_id: String,
    pub query_window_index: usize,
    pub query_window_start_time: f64,
    pub matched_template_id: String,
    pub matched_template_window: usize,
    pub distance: f32,
    /// 0 = nearest
    pub rank: usize,
}

impl SearchResult {
    pub fn query_key(&self) -> RecordKey {
        RecordKey {
            source_id: self.query_source_id.clone(),
            window_index: self.query_window_index,
        }
    }
}
