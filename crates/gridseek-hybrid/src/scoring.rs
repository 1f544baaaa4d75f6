//! Distance -> similarity normalizers.

use serde::{Deserialize, Serialize};

/// Score given to the worst candidate under [`ScoreNormalizer::MinMax`].
pub const MIN_MAX_FLOOR: f32 = 1e-3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalizer {
    /// `1 / (1 + distance)`.
    #[default]
    Reciprocal,
    /// Linear over the candidate set: nearest = 1, farthest = `MIN_MAX_FLOOR`.
    MinMax,
    /// `1 / rank` in distance order.
    Rank,
}

impl ScoreNormalizer {
    /// Scores for `distances`, which must be in ascending order. Every score
    /// lies in `(0, 1]`.
    pub fn scores(&self, distances: &[f32]) -> Vec<f32> {
        match self {
            Self::Reciprocal => distances.iter().map(|&d| reciprocal(d)).collect(),
            Self::MinMax => {
                let (Some(min), Some(max)) = (distances.first(), distances.last()) else { return vec![] };
                let span = max - min;
                if span <= f32::EPSILON { return vec![1.0; distances.len()]; }
                distances
                    .iter()
                    .map(|d| 1.0 - (1.0 - MIN_MAX_FLOOR) * (d - min) / span)
                    .map(|s| if s.is_nan() { MIN_MAX_FLOOR } else { s.clamp(MIN_MAX_FLOOR, 1.0) })
                    .collect()
            }
            Self::Rank => (1..=distances.len()).map(|r| 1.0 / r as f32).collect(),
        }
    }
}

/// Computed in f64 so huge distances do not round to zero; NaN scores lowest.
fn reciprocal(distance: f32) -> f32 {
    if distance.is_nan() { return f32::MIN_POSITIVE; }
    let score = 1.0 / (1.0 + f64::from(distance.max(0.0)));
    (score as f32).max(f32::MIN_POSITIVE)
}
