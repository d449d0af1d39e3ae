//! Index coordination and client operations for prefmatch.
//!
//! - [`IndexCoordinator`]: owns engine, registry and store behind one lock
//! - [`MatchService`]: serde request/response operations over a coordinator
//! - [`RefreshWorker`]: periodic full rebuild from a [`VectorSource`](prefmatch_core::VectorSource)

pub mod api;
pub mod coordinator;
pub mod refresh;

pub use api::{
    AddVectorRequest, AddVectorResponse, BulkLoadRequest, BulkLoadResponse, ClearResponse,
    MatchService, QueryRequest, QueryResponse, StatsResponse,
};
pub use coordinator::{
    BulkLoadSummary, CoordinatorMetrics, CoordinatorMetricsSnapshot, IndexCoordinator,
};
pub use refresh::{RefreshMetrics, RefreshMetricsSnapshot, RefreshWorker, RefreshWorkerConfig};
