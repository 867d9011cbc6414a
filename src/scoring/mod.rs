//! Turns ranked template matches into one score per query window.

use std::collections::HashMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{RecordKey, SearchResult};

/// Rule combining a query's template distances into one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// Smallest distance; any single close template qualifies
    #[default]
    MinDistance,
    /// Mean of the k nearest distances
    MeanKDistance,
    /// Largest of the k nearest distances
    MaxDistance,
}

impl AggregationPolicy {
    fn aggregate(self, distances: &[f32]) -> f32 {
        let min = distances.iter().copied().fold(f32::INFINITY, f32::min);
        let max = distances.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        match self {
            AggregationPolicy::MinDistance => min,
            AggregationPolicy::MaxDistance => max,
            AggregationPolicy::MeanKDistance => {
                let sum: f64 = distances.iter().map(|&d| f64::from(d)).sum();
                let mean = (sum / distances.len() as f64) as f32;
                // rounding must never push the mean outside [min, max]
                mean.clamp(min, max)
            }
        }
    }
}

/// Aggregate similarity of one query window to the template set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionScore {
    pub query_source_id: String,
    pub query_window_index: usize,
    pub query_window_start_time: f64,
    /// Lower is more similar
    pub score: f32,
    pub best_template_id: String,
    pub best_template_window: usize,
    /// Number of template matches that were aggregated
    pub matches: usize,
}

/// Best-scoring window of one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceScore {
    pub source_id: String,
    pub score: f32,
    pub best_window_index: usize,
    pub best_window_start_time: f64,
    pub windows: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thresholded {
    pub candidates: Vec<DetectionScore>,
    pub rejected: Vec<DetectionScore>,
}

/// Scores every query appearing in `results`, most similar first.
///
/// Equal scores keep the order in which queries first appear in `results`.
pub fn score(results: &[SearchResult], policy: AggregationPolicy) -> Vec<DetectionScore> {
    let mut order: Vec<RecordKey> = Vec::new();
    let mut groups: HashMap<RecordKey, Vec<&SearchResult>> = HashMap::new();
    for result in results {
        let key = result.query_key();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(result);
    }

    let mut scores: Vec<DetectionScore> = order
        .iter()
        .filter_map(|key| groups.get(key))
        .map(|group| {
            let distances: Vec<f32> = group.iter().map(|r| r.distance).collect();
            let best = group
                .iter()
                .min_by(|a, b| a.rank.cmp(&b.rank).then(a.distance.total_cmp(&b.distance)))
                .copied()
                .unwrap_or(group[0]);
            DetectionScore {
                query_source_id: best.query_source_id.clone(),
                query_window_index: best.query_window_index,
                query_window_start_time: best.query_window_start_time,
                score: policy.aggregate(&distances),
                best_template_id: best.matched_template_id.clone(),
                best_template_window: best.matched_template_window,
                matches: group.len(),
            }
        })
        .collect();
    scores.sort_by(|a, b| a.score.total_cmp(&b.score));
    scores
}

/// Splits scores at `cutoff`; a score equal to the cutoff is a candidate.
pub fn threshold(scores: Vec<DetectionScore>, cutoff: f32) -> Result<Thresholded> {
    if !cutoff.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "threshold must be finite, got {cutoff}"
        )));
    }
    let (candidates, rejected): (Vec<_>, Vec<_>) =
        scores.into_iter().partition(|s| s.score <= cutoff);
    Ok(Thresholded {
        candidates,
        rejected,
    })
}

/// Collapses window scores to one entry per recording, best first.
pub fn rank_sources(scores: &[DetectionScore]) -> Vec<SourceScore> {
    let mut ranked: Vec<SourceScore> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for score in scores {
        match positions.get(score.query_source_id.as_str()) {
            Some(&idx) => {
                let entry = &mut ranked[idx];
                entry.windows += 1;
                if score.score < entry.score {
                    entry.score = score.score;
                    entry.best_window_index = score.query_window_index;
                    entry.best_window_start_time = score.query_window_start_time;
                }
            }
            None => {
                positions.insert(score.query_source_id.as_str(), ranked.len());
                ranked.push(SourceScore {
                    source_id: score.query_source_id.clone(),
                    score: score.score,
                    best_window_index: score.query_window_index,
                    best_window_start_time: score.query_window_start_time,
                    windows: 1,
                });
            }
        }
    }
    ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
    ranked
}
