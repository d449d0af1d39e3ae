//! Over-fetch, penalize and truncate.
//!
//! Candidates whose stored vector has unknown components get their distance
//! scaled by `max(0, 1 - 0.1 * missing)` before the final sort. Because the
//! penalty can reorder candidates, the engine is asked for
//! [`OVER_FETCH_FACTOR`] times the requested count.

use prefmatch_core::{AnnHits, NO_MATCH_ID, RankedMatches, count_missing};
use prefmatch_index::{IdentifierRegistry, VectorStore};
use tracing::instrument;

/// Candidates fetched from the engine per requested result.
pub const OVER_FETCH_FACTOR: usize = 3;

/// Penalty reduction per missing component.
pub const MISSING_PENALTY_STEP: f32 = 0.1;

/// Score multiplier for a stored vector with `missing` unknown components.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn missing_penalty(missing: usize) -> f32 {
    MISSING_PENALTY_STEP
        .mul_add(-(missing as f32), 1.0)
        .max(0.0)
}

/// Number of candidates to request from an engine holding `index_size`
/// entries when `top_k` results are wanted.
#[must_use]
pub const fn over_fetch(top_k: usize, index_size: usize) -> usize {
    let wanted = top_k.saturating_mul(OVER_FETCH_FACTOR);
    if wanted < index_size { wanted } else { index_size }
}

/// Turn raw engine hits into the final ranking.
///
/// - Hits with the no-match id, or whose internal id has no registered
///   external id, are dropped.
/// - Scores are multiplied by [`missing_penalty`] of the stored vector. A hit
///   with no stored vector keeps its raw score.
/// - The result is stably sorted ascending (ties keep engine order) and
///   truncated to `top_k`.
#[instrument(name = "prefmatch::rerank", skip_all, fields(candidates = hits.len(), top_k = top_k))]
pub fn rerank_hits(
    hits: &AnnHits,
    registry: &IdentifierRegistry,
    store: &VectorStore,
    top_k: usize,
) -> RankedMatches {
    let mut scored: Vec<(&str, f32)> = Vec::with_capacity(hits.len());
    let mut dropped = 0_usize;
    for (internal, raw) in hits.iter() {
        if internal == NO_MATCH_ID {
            continue;
        }
        let Some(external) = registry.reverse(internal) else {
            dropped += 1;
            continue;
        };
        let adjusted = store
            .get(external)
            .map_or(raw, |vector| raw * missing_penalty(count_missing(vector)));
        scored.push((external, adjusted));
    }

    // `sort_by` is stable, so equal scores keep engine order.
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(top_k);

    if dropped > 0 {
        tracing::debug!(target: "prefmatch.rerank", dropped, "dropped hits without a registered id");
    }
    tracing::debug!(target: "prefmatch.rerank", returned = scored.len(), "rerank complete");

    let mut ranked = RankedMatches {
        user_ids: Vec::with_capacity(scored.len()),
        scores: Vec::with_capacity(scored.len()),
    };
    for (external, score) in scored {
        ranked.user_ids.push(external.to_owned());
        ranked.scores.push(score);
    }
    ranked
}
