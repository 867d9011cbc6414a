use clap::ValueEnum;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Distance between two embeddings; smaller is more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    /// L2 distance
    #[default]
    Euclidean,
    /// 1 - cosine similarity, in [0, 2]
    Cosine,
}

impl Metric {
    pub fn distance(self, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
        match self {
            Metric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| {
                    let diff = x - y;
                    diff * diff
                })
                .sum::<f32>()
                .sqrt(),
            Metric::Cosine => {
                // f64 keeps tiny-magnitude vectors from underflowing
                let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
                for (&x, &y) in a.iter().zip(b.iter()) {
                    let (x, y) = (f64::from(x), f64::from(y));
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                // Zero vectors have no direction; treat them as orthogonal.
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 2.0) as f32
            }
        }
    }
}
