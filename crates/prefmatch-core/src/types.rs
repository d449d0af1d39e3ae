use serde::{Deserialize, Serialize};

use crate::error::{MatchError, MatchResult};

// ---------------------------------------------------------------------------
// Vector conventions
// ---------------------------------------------------------------------------

/// Component value marking an unknown preference.
pub const MISSING_SENTINEL: f32 = -1.0;

/// Value substituted for [`MISSING_SENTINEL`] in query vectors before they
/// reach the ANN engine, which has no notion of "missing".
pub const NEUTRAL_QUERY_VALUE: f32 = 0.0;

/// Id reported by an ANN engine for unfilled result slots.
pub const NO_MATCH_ID: i64 = -1;

/// Number of components of `vector` equal to [`MISSING_SENTINEL`].
#[must_use]
#[allow(clippy::float_cmp)]
pub fn count_missing(vector: &[f32]) -> usize {
    vector.iter().filter(|&&value| value == MISSING_SENTINEL).count()
}

/// Copy of `query` with every missing component replaced by
/// [`NEUTRAL_QUERY_VALUE`].
#[must_use]
#[allow(clippy::float_cmp)]
pub fn sanitize_query(query: &[f32]) -> Vec<f32> {
    query
        .iter()
        .map(|&value| {
            if value == MISSING_SENTINEL {
                NEUTRAL_QUERY_VALUE
            } else {
                value
            }
        })
        .collect()
}

/// Check that a submitted vector has `dimension` finite components.
///
/// # Errors
///
/// Returns `MatchError::InvalidVectorSize` on a length mismatch and
/// `MatchError::NonFiniteComponent` for NaN or infinite values.
pub fn validate_vector(user_id: &str, vector: &[f32], dimension: usize) -> MatchResult<()> {
    if vector.len() != dimension {
        return Err(MatchError::InvalidVectorSize {
            user_id: user_id.to_owned(),
            expected: dimension,
            found: vector.len(),
        });
    }
    if let Some(position) = vector.iter().position(|value| !value.is_finite()) {
        return Err(MatchError::NonFiniteComponent {
            user_id: user_id.to_owned(),
            position,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Submission and result types
// ---------------------------------------------------------------------------

/// One user's preference vector as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserVector {
    /// Opaque external identifier.
    pub user_id: String,
    /// Raw preference vector; `-1` marks unknown components.
    pub vector: Vec<f32>,
}

impl UserVector {
    #[must_use]
    pub fn new(user_id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            user_id: user_id.into(),
            vector,
        }
    }
}

/// Raw ANN engine output: parallel id/score sequences in ascending distance
/// order, padded with [`NO_MATCH_ID`] when fewer than `k` entries exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnHits {
    pub ids: Vec<i64>,
    pub scores: Vec<f32>,
}

impl AnnHits {
    #[must_use]
    pub fn with_capacity(k: usize) -> Self {
        Self {
            ids: Vec::with_capacity(k),
            scores: Vec::with_capacity(k),
        }
    }

    /// Append one hit.
    pub fn push(&mut self, id: i64, score: f32) {
        self.ids.push(id);
        self.scores.push(score);
    }

    /// Pad with no-match slots until `k` entries are present.
    pub fn pad_to(&mut self, k: usize) {
        while self.ids.len() < k {
            self.push(NO_MATCH_ID, f32::INFINITY);
        }
    }

    /// Iterate `(id, score)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f32)> + '_ {
        self.ids.iter().copied().zip(self.scores.iter().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Final ranked output: index-aligned external ids and adjusted scores,
/// lower score = more similar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedMatches {
    pub user_ids: Vec<String>,
    pub scores: Vec<f32>,
}

impl RankedMatches {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            user_ids: Vec::new(),
            scores: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.user_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
    }

    /// Position of `user_id` in the ranking, if present.
    #[must_use]
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.user_ids.iter().position(|id| id == user_id)
    }
}

/// Point-in-time shape of the live index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Entries reported by the ANN engine.
    pub engine_size: usize,
    /// Registered external ids.
    pub registered_ids: usize,
    /// Stored raw vectors.
    pub stored_vectors: usize,
    /// Configured dimensionality.
    pub dimension: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_missing_only_counts_exact_sentinel() {
        assert_eq!(count_missing(&[1.0, -1.0, 0.0, -1.0]), 2);
        assert_eq!(count_missing(&[-0.5, -1.5]), 0);
        assert_eq!(count_missing(&[]), 0);
    }

    #[test]
    fn sanitize_replaces_sentinel_with_zero() {
        assert_eq!(sanitize_query(&[1.0, -1.0, 0.25]), vec![1.0, 0.0, 0.25]);
    }

    #[test]
    fn validate_rejects_wrong_length() {
        let err = validate_vector("a", &[1.0, 2.0, 3.0], 4).unwrap_err();
        assert!(matches!(
            err,
            MatchError::InvalidVectorSize {
                expected: 4,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_nan() {
        let err = validate_vector("a", &[1.0, f32::NAN], 2).unwrap_err();
        assert!(matches!(
            err,
            MatchError::NonFiniteComponent { position: 1, .. }
        ));
    }

    #[test]
    fn validate_accepts_sentinel() {
        assert!(validate_vector("a", &[-1.0, -1.0], 2).is_ok());
    }

    #[test]
    fn ann_hits_padding() {
        let mut hits = AnnHits::with_capacity(3);
        hits.push(7, 0.5);
        hits.pad_to(3);
        assert_eq!(hits.ids, vec![7, NO_MATCH_ID, NO_MATCH_ID]);
        assert!(hits.scores[2].is_infinite());
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn ranked_matches_uses_wire_field_names() {
        let matches = RankedMatches {
            user_ids: vec!["a".into()],
            scores: vec![0.0],
        };
        let encoded = serde_json::to_value(&matches).expect("serialize");
        assert_eq!(encoded["user_ids"], serde_json::json!(["a"]));
        assert_eq!(encoded["scores"], serde_json::json!([0.0]));
        assert_eq!(matches.rank_of("a"), Some(0));
        assert_eq!(matches.rank_of("b"), None);
    }
}
