//! Exact nearest-neighbor search over a template set.
//!
//! Every query is compared against every template. Template sets are small
//! (tens to hundreds of vectors), so a linear scan keeps rankings exact and
//! reproducible.

mod metric;

use ndarray::{Array2, ArrayView1};
use tracing::debug;

use crate::collection::{QuerySet, TemplateSet};
use crate::error::{Error, Result};
use crate::types::{RecordKey, SearchResult};

pub use metric::Metric;

/// One template matched against a single vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Position of the template in the template set
    pub position: usize,
    pub template: RecordKey,
    pub distance: f32,
}

/// Read-only index built once per search session.
#[derive(Debug, Clone)]
pub struct TemplateIndex {
    metric: Metric,
    keys: Vec<RecordKey>,
    vectors: Array2<f32>,
}

impl TemplateIndex {
    pub fn build(templates: &TemplateSet, metric: Metric) -> Result<Self> {
        let collection = templates.collection();
        let dimension = collection.dimension().ok_or(Error::EmptyTemplateSet)?;
        let mut vectors = Array2::zeros((collection.len(), dimension));
        let mut keys = Vec::with_capacity(collection.len());
        for (mut row, record) in vectors.rows_mut().into_iter().zip(collection) {
            if record.dimension() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    found: record.dimension(),
                });
            }
            row.assign(&ArrayView1::from(record.vector.as_slice()));
            keys.push(record.key());
        }
        debug!(
            templates = keys.len(),
            dimension,
            metric = ?metric,
            "built template index"
        );
        Ok(Self {
            metric,
            keys,
            vectors,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The `k` templates closest to `vector`, nearest first.
    ///
    /// Equal distances keep template insertion order.
    pub fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(Error::InvalidParameter("k must be at least 1".into()));
        }
        if vector.len() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                found: vector.len(),
            });
        }
        let query = ArrayView1::from(vector);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .rows()
            .into_iter()
            .map(|template| self.metric.distance(query, template))
            .enumerate()
            .collect();
        // sort_by is stable, which fixes the tie order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(position, distance)| Neighbor {
                position,
                template: self.keys[position].clone(),
                distance,
            })
            .collect())
    }

    /// Ranked matches for every query record, in query insertion order.
    pub fn query(&self, queries: &QuerySet, k: usize) -> Result<Vec<SearchResult>> {
        if let Some(found) = queries.collection().dimension() {
            if found != self.dimension() {
                return Err(Error::DimensionMismatch {
                    expected: self.dimension(),
                    found,
                });
            }
        }
        let per_query = k.min(self.len());
        let mut results = Vec::with_capacity(queries.len() * per_query);
        for record in queries.collection() {
            let neighbors = self.nearest(&record.vector, k)?;
            results.extend(
                neighbors
                    .into_iter()
                    .enumerate()
                    .map(|(rank, neighbor)| SearchResult {
                        query_source_id: record.source_id.clone(),
                        query_window_index: record.window_index,
                        query_window_start_time: record.window_start_time,
                        matched_template_id: neighbor.template.source_id,
                        matched_template_window: neighbor.template.window_index,
                        distance: neighbor.distance,
                        rank,
                    }),
            );
        }
        debug!(
            queries = queries.len(),
            results = results.len(),
            k,
            "template query complete"
        );
        Ok(results)
    }
}
