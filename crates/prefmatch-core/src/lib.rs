//! Core types, traits, errors and configuration for the prefmatch preference
//! matching engine.
//!
//! Every other crate in the workspace depends on this one. It defines the
//! preference-vector conventions (`-1` marks an unknown component), the
//! [`AnnEngine`] and [`VectorSource`] seams, the [`MatchError`] type and the
//! process-wide [`MatchConfig`].

pub mod config;
pub mod error;
pub mod schema;
pub mod tracing_config;
pub mod traits;
pub mod types;

pub use config::{
    DEFAULT_DIMENSION, DEFAULT_ID_SPACE, DEFAULT_MAX_ID_ATTEMPTS, DEFAULT_TOP_K, EngineKind,
    MatchConfig,
};
pub use error::{MatchError, MatchResult};
pub use schema::{PreferenceAttribute, PreferenceSchema};
pub use traits::{AnnEngine, StaticVectorSource, VectorSource};
pub use types::{
    AnnHits, IndexStats, MISSING_SENTINEL, NEUTRAL_QUERY_VALUE, NO_MATCH_ID, RankedMatches,
    UserVector, count_missing, sanitize_query, validate_vector,
};
