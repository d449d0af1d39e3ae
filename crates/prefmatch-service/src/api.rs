//! Transport-agnostic request/response surface.
//!
//! [`MatchService`] exposes the four client operations (add one vector, bulk
//! load, query, clear) over serde types. Transports (the NDJSON binary, an
//! HTTP layer, tests) only decode requests and encode responses.

use std::sync::Arc;

use prefmatch_core::{AnnEngine, IndexStats, MatchResult, RankedMatches, UserVector};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::coordinator::{BulkLoadSummary, CoordinatorMetricsSnapshot, IndexCoordinator};

/// Add (or replace) one user's vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddVectorRequest {
    pub user_id: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddVectorResponse {
    pub internal_id: i64,
    pub message: String,
}

/// Replace the whole index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkLoadRequest {
    pub user_vectors: Vec<UserVector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLoadResponse {
    pub loaded: usize,
    pub duplicates: usize,
    pub message: String,
}

/// Nearest-neighbor query. `top_k` falls back to the configured default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

/// Ranked matches, index-aligned; lower score means more similar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub user_ids: Vec<String>,
    pub scores: Vec<f32>,
}

impl From<RankedMatches> for QueryResponse {
    fn from(ranked: RankedMatches) -> Self {
        Self {
            user_ids: ranked.user_ids,
            scores: ranked.scores,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
}

/// Index shape plus coordinator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub index: IndexStats,
    pub metrics: CoordinatorMetricsSnapshot,
}

/// Client-facing operations over a shared [`IndexCoordinator`].
#[derive(Debug)]
pub struct MatchService<E: AnnEngine = Box<dyn AnnEngine>> {
    coordinator: Arc<IndexCoordinator<E>>,
}

impl<E: AnnEngine> Clone for MatchService<E> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

impl<E: AnnEngine> MatchService<E> {
    #[must_use]
    pub const fn new(coordinator: Arc<IndexCoordinator<E>>) -> Self {
        Self { coordinator }
    }

    #[must_use]
    pub const fn coordinator(&self) -> &Arc<IndexCoordinator<E>> {
        &self.coordinator
    }

    /// # Errors
    ///
    /// Propagates [`IndexCoordinator::insert_one`] errors.
    pub fn add_vector(&self, request: AddVectorRequest) -> MatchResult<AddVectorResponse> {
        let internal_id = self
            .coordinator
            .insert_one(&request.user_id, request.vector)?;
        Ok(AddVectorResponse {
            internal_id,
            message: format!("User {} added", request.user_id),
        })
    }

    /// # Errors
    ///
    /// Propagates [`IndexCoordinator::insert_bulk`] errors.
    pub fn bulk_load(&self, request: BulkLoadRequest) -> MatchResult<BulkLoadResponse> {
        let BulkLoadSummary {
            loaded, duplicates, ..
        } = self.coordinator.insert_bulk(request.user_vectors)?;
        Ok(BulkLoadResponse {
            loaded,
            duplicates,
            message: format!("Loaded {loaded} user vectors"),
        })
    }

    /// # Errors
    ///
    /// Propagates [`IndexCoordinator::search`] errors.
    pub fn query(&self, request: &QueryRequest) -> MatchResult<QueryResponse> {
        let top_k = request
            .top_k
            .unwrap_or(self.coordinator.config().default_top_k);
        self.coordinator
            .search(&request.vector, top_k)
            .map(QueryResponse::from)
    }

    pub fn clear(&self) -> ClearResponse {
        self.coordinator.reset();
        info!(target: "prefmatch.service", "clear requested");
        ClearResponse {
            message: "Index has been reset".to_owned(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> StatsResponse {
        StatsResponse {
            index: self.coordinator.stats(),
            metrics: self.coordinator.metrics().snapshot(),
        }
    }
}
