//! # prefmatch
//!
//! Nearest-neighbor matching of users by fixed-length preference vectors.
//!
//! Clients submit one vector per user (component value `-1` marks an unknown
//! preference) and later ask which users are most similar to a given vector.
//! The crate sits between that API and an approximate nearest-neighbor
//! engine and provides:
//!
//! 1. a stable bijection between opaque string user ids and the integer ids
//!    the engine works with, with bounded collision retry;
//! 2. atomic full rebuilds of the index while searches are running;
//! 3. over-fetch, penalize and truncate reranking that scales each
//!    candidate's distance by `max(0, 1 - 0.1 * missing)`.
//!
//! # Quick Start
//!
//! ```rust
//! use prefmatch::EngineKind;
//! use prefmatch::prelude::*;
//!
//! let config = MatchConfig::default()
//!     .with_dimension(4)
//!     .with_engine(EngineKind::Flat);
//! let coordinator = IndexCoordinator::from_config(&config).expect("coordinator");
//!
//! coordinator
//!     .insert_bulk(vec![
//!         UserVector::new("a", vec![1.0, 0.0, 0.0, 0.0]),
//!         UserVector::new("b", vec![1.0, 0.0, 0.0, -1.0]),
//!     ])
//!     .expect("bulk load");
//!
//! let matches = coordinator.search(&[1.0, 0.0, 0.0, 0.0], 2).expect("search");
//! assert_eq!(matches.user_ids, vec!["a", "b"]);
//! ```
//!
//! # Crates
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `prefmatch-core` | errors, config, vector conventions, `AnnEngine` / `VectorSource` |
//! | `prefmatch-index` | identifier registry, vector store, HNSW and exact engines |
//! | `prefmatch-rerank` | missing-component penalty reranking |
//! | `prefmatch-service` | coordinator, request API, scheduled refresh |

pub use prefmatch_core::{
    AnnEngine, AnnHits, EngineKind, IndexStats, MISSING_SENTINEL, MatchConfig, MatchError,
    MatchResult, NO_MATCH_ID, PreferenceAttribute, PreferenceSchema, RankedMatches,
    StaticVectorSource, UserVector, VectorSource, count_missing, sanitize_query,
};
pub use prefmatch_index::{
    FlatEngine, HnswConfig, HnswEngine, IdHasher, IdentifierRegistry, VectorStore,
    engine_from_config, sha256_prefix,
};
pub use prefmatch_rerank::{
    MISSING_PENALTY_STEP, OVER_FETCH_FACTOR, missing_penalty, over_fetch, rerank_hits,
};
pub use prefmatch_service::{
    AddVectorRequest, AddVectorResponse, BulkLoadRequest, BulkLoadResponse, BulkLoadSummary,
    ClearResponse, CoordinatorMetricsSnapshot, IndexCoordinator, MatchService, QueryRequest,
    QueryResponse, RefreshMetricsSnapshot, RefreshWorker, RefreshWorkerConfig, StatsResponse,
};

/// Common imports.
pub mod prelude {
    pub use asupersync::Cx;

    pub use crate::{
        AnnEngine, IndexCoordinator, MatchConfig, MatchError, MatchResult, MatchService,
        PreferenceSchema, RankedMatches, RefreshWorker, UserVector, VectorSource,
    };
}
