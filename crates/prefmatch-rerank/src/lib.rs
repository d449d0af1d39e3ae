//! Reranking of raw ANN hits for prefmatch.
//!
//! The coordinator over-fetches candidates from the ANN engine, then
//! [`rerank_hits`] maps them back to external ids, applies the
//! missing-component penalty and truncates to the requested count.

pub mod pipeline;

pub use pipeline::{MISSING_PENALTY_STEP, OVER_FETCH_FACTOR, missing_penalty, over_fetch, rerank_hits};
