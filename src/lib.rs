//! Similarity-search detection of a target sound against labeled templates.
//!
//! Audio files are embedded window by window ([`pipeline`]), persisted at
//! reduced precision ([`store`]), and compared against confirmed exemplars
//! with an exact nearest-neighbor search ([`index`]) whose distances are
//! aggregated into ranked, thresholdable scores ([`scoring`]).

pub mod audio;
pub mod collection;
pub mod config;
pub mod error;
pub mod extractor;
pub mod index;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod store;
pub mod types;

pub use collection::{EmbeddingCollection, QuerySet, TemplateSet};
pub use error::{Error, Result};
pub use types::{
    AudioClip, EmbeddingRecord, OutcomeStatus, ProcessingOutcome, RecordKey, SearchResult,
};
