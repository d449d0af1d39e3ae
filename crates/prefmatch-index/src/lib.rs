//! Identifier registry, raw vector store and ANN engines for prefmatch.
//!
//! Two [`AnnEngine`] implementations are provided: [`HnswEngine`] (approximate,
//! `hnsw_rs`) and [`FlatEngine`] (exact scan). Both report squared Euclidean
//! distances in ascending order.

pub mod flat;
pub mod hnsw;
pub mod registry;
pub mod store;

pub use flat::FlatEngine;
pub use hnsw::{HnswConfig, HnswEngine};
pub use registry::{IdHasher, IdentifierRegistry, sha256_prefix};
pub use store::VectorStore;

use prefmatch_core::{AnnEngine, EngineKind, MatchConfig, MatchResult};

/// Build the engine selected by `config.engine`.
///
/// # Errors
///
/// Returns `MatchError::InvalidConfig` when the HNSW parameters are invalid.
pub fn engine_from_config(config: &MatchConfig) -> MatchResult<Box<dyn AnnEngine>> {
    Ok(match config.engine {
        EngineKind::Hnsw => Box::new(HnswEngine::from_match_config(config)?),
        EngineKind::Flat => Box::new(FlatEngine::new(config.dimension)),
    })
}
