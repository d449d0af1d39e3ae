//! Owner of the live index.
//!
//! [`IndexCoordinator`] keeps the ANN engine, the identifier registry and the
//! raw vector store behind a single `RwLock`, so the three are always mutated
//! together and every search observes one consistent snapshot.
//!
//! Bulk loads prepare the new registry and store outside the lock and only
//! hold the write lock for the engine rebuild and the swap. A concurrent
//! search therefore sees either the complete old index or the complete new
//! one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use prefmatch_core::{
    AnnEngine, IndexStats, MatchConfig, MatchError, MatchResult, RankedMatches, UserVector,
    sanitize_query, validate_vector,
};
use prefmatch_index::{IdentifierRegistry, VectorStore, engine_from_config};
use prefmatch_rerank::{over_fetch, rerank_hits};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Engine, registry and store, always locked together.
#[derive(Debug)]
struct IndexState<E> {
    engine: E,
    registry: IdentifierRegistry,
    store: VectorStore,
}

/// Outcome of a bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLoadSummary {
    /// Entries in the submitted batch.
    pub submitted: usize,
    /// Distinct users now indexed.
    pub loaded: usize,
    /// Entries superseded by a later entry for the same user.
    pub duplicates: usize,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Lock-free coordinator counters.
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    pub single_inserts: AtomicU64,
    pub bulk_loads: AtomicU64,
    pub bulk_vectors: AtomicU64,
    pub searches: AtomicU64,
    /// Searches answered without touching the engine (empty index or `top_k == 0`).
    pub empty_searches: AtomicU64,
    pub resets: AtomicU64,
    pub rejected: AtomicU64,
}

impl CoordinatorMetrics {
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorMetricsSnapshot {
        CoordinatorMetricsSnapshot {
            single_inserts: self.single_inserts.load(Ordering::Relaxed),
            bulk_loads: self.bulk_loads.load(Ordering::Relaxed),
            bulk_vectors: self.bulk_vectors.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            empty_searches: self.empty_searches.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CoordinatorMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorMetricsSnapshot {
    pub single_inserts: u64,
    pub bulk_loads: u64,
    pub bulk_vectors: u64,
    pub searches: u64,
    pub empty_searches: u64,
    pub resets: u64,
    pub rejected: u64,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Serializes index mutations and answers nearest-neighbor queries.
///
/// Create one at start-up and share it through an `Arc`.
#[derive(Debug)]
pub struct IndexCoordinator<E: AnnEngine = Box<dyn AnnEngine>> {
    state: RwLock<IndexState<E>>,
    /// Empty registry carrying the id space, attempt budget and hasher used
    /// for every rebuild.
    registry_template: IdentifierRegistry,
    config: MatchConfig,
    metrics: CoordinatorMetrics,
}

impl IndexCoordinator {
    /// Coordinator over the engine selected by `config.engine`.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::InvalidConfig` for an invalid configuration.
    pub fn from_config(config: &MatchConfig) -> MatchResult<Self> {
        config.validate()?;
        Self::new(engine_from_config(config)?, config)
    }
}

impl<E: AnnEngine> IndexCoordinator<E> {
    /// Coordinator over `engine`, using SHA-256 id derivation.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::InvalidConfig` when the configuration is invalid
    /// or the engine dimension differs from `config.dimension`.
    pub fn new(engine: E, config: &MatchConfig) -> MatchResult<Self> {
        let registry = IdentifierRegistry::new(config.id_space, config.max_id_attempts);
        Self::with_registry(engine, registry, config)
    }

    /// Coordinator with an explicit (empty) registry, e.g. one with a custom
    /// id hasher.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_registry(
        mut engine: E,
        registry: IdentifierRegistry,
        config: &MatchConfig,
    ) -> MatchResult<Self> {
        config.validate()?;
        if engine.dimension() != config.dimension {
            return Err(MatchError::InvalidConfig {
                field: "dimension".into(),
                value: config.dimension.to_string(),
                reason: format!(
                    "engine {} was built for {}-dim vectors",
                    engine.id(),
                    engine.dimension()
                ),
            });
        }
        engine.reset();
        let registry_template = registry.empty_like();
        Ok(Self {
            state: RwLock::new(IndexState {
                engine,
                registry: registry.empty_like(),
                store: VectorStore::new(),
            }),
            registry_template,
            config: config.clone(),
            metrics: CoordinatorMetrics::default(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.config.dimension
    }

    #[must_use]
    pub const fn metrics(&self) -> &CoordinatorMetrics {
        &self.metrics
    }

    /// Add or replace one user's vector. Returns the user's internal id.
    ///
    /// The entry is visible to searches once this returns.
    ///
    /// # Errors
    ///
    /// - `MatchError::InvalidVectorSize` / `NonFiniteComponent` for a bad
    ///   vector (nothing is changed)
    /// - `MatchError::IdentifierSpaceExhausted` when no internal id is free
    /// - `MatchError::EngineFailure` if the engine rejects the vector; a user
    ///   registered by this call is unregistered again
    #[instrument(name = "prefmatch::insert_one", skip_all, fields(user_id = external))]
    pub fn insert_one(&self, external: &str, vector: Vec<f32>) -> MatchResult<i64> {
        if let Err(err) = validate_vector(external, &vector, self.config.dimension) {
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(err);
        }

        let mut state = self.write_state();
        let already_registered = state.registry.get(external).is_some();
        let internal = state.registry.resolve(external)?;
        if let Err(err) = state
            .engine
            .insert(&[internal], std::slice::from_ref(&vector))
        {
            if !already_registered {
                state.registry.release(external);
            }
            drop(state);
            warn!(
                target: "prefmatch.coordinator",
                user_id = external,
                error = %err,
                "engine rejected insert"
            );
            return Err(err);
        }
        state.store.put(external, vector);
        drop(state);

        self.metrics.single_inserts.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "prefmatch.coordinator",
            user_id = external,
            internal_id = internal,
            "vector inserted"
        );
        Ok(internal)
    }

    /// Replace the whole index with `entries`.
    ///
    /// Every vector is validated before anything changes; the first bad entry
    /// is reported. Repeated user ids collapse to their last vector.
    ///
    /// # Errors
    ///
    /// - `MatchError::InvalidVectorSize` / `NonFiniteComponent` naming the
    ///   first bad entry (prior index untouched)
    /// - `MatchError::IdentifierSpaceExhausted` (prior index untouched)
    /// - `MatchError::EngineFailure` if the engine rejects the batch, in which
    ///   case the index is left empty
    #[instrument(name = "prefmatch::insert_bulk", skip_all, fields(submitted = entries.len()))]
    pub fn insert_bulk(&self, entries: Vec<UserVector>) -> MatchResult<BulkLoadSummary> {
        let start = Instant::now();
        for entry in &entries {
            if let Err(err) = validate_vector(&entry.user_id, &entry.vector, self.config.dimension)
            {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "prefmatch.coordinator",
                    user_id = %entry.user_id,
                    error = %err,
                    "bulk load rejected"
                );
                return Err(err);
            }
        }

        let submitted = entries.len();
        let deduped = dedupe_last_wins(entries);

        let mut registry = self.registry_template.empty_like();
        let mut store = VectorStore::with_capacity(deduped.len());
        let mut ids = Vec::with_capacity(deduped.len());
        let mut vectors = Vec::with_capacity(deduped.len());
        for entry in deduped {
            ids.push(registry.resolve(&entry.user_id)?);
            store.put(entry.user_id, entry.vector.clone());
            vectors.push(entry.vector);
        }
        let loaded = ids.len();

        {
            let mut state = self.write_state();
            state.engine.reset();
            if let Err(err) = state.engine.insert(&ids, &vectors) {
                state.engine.reset();
                state.registry.clear();
                state.store.clear();
                return Err(err);
            }
            state.registry = registry;
            state.store = store;
        }

        self.metrics.bulk_loads.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .bulk_vectors
            .fetch_add(loaded as u64, Ordering::Relaxed);
        info!(
            target: "prefmatch.coordinator",
            submitted,
            loaded,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "index rebuilt from bulk load"
        );
        Ok(BulkLoadSummary {
            submitted,
            loaded,
            duplicates: submitted - loaded,
        })
    }

    /// Up to `top_k` users most similar to `query`, best first.
    ///
    /// Unknown (`-1`) query components are treated as `0`. An empty index or
    /// `top_k == 0` yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::QueryDimensionMismatch` for a wrongly sized query
    /// and `MatchError::NonFiniteComponent` for NaN or infinite components.
    #[instrument(name = "prefmatch::search", skip_all, fields(top_k = top_k))]
    pub fn search(&self, query: &[f32], top_k: usize) -> MatchResult<RankedMatches> {
        if query.len() != self.config.dimension {
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(MatchError::QueryDimensionMismatch {
                expected: self.config.dimension,
                found: query.len(),
            });
        }
        if let Some(position) = query.iter().position(|value| !value.is_finite()) {
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(MatchError::NonFiniteComponent {
                user_id: "<query>".into(),
                position,
            });
        }
        self.metrics.searches.fetch_add(1, Ordering::Relaxed);
        if top_k == 0 {
            self.metrics.empty_searches.fetch_add(1, Ordering::Relaxed);
            return Ok(RankedMatches::empty());
        }

        let sanitized = sanitize_query(query);
        let state = self.read_state();
        let size = state.engine.size();
        if size == 0 {
            self.metrics.empty_searches.fetch_add(1, Ordering::Relaxed);
            return Ok(RankedMatches::empty());
        }
        let fetch = over_fetch(top_k, size);
        let hits = state.engine.search(&sanitized, fetch)?;
        let ranked = rerank_hits(&hits, &state.registry, &state.store, top_k);
        drop(state);

        debug!(
            target: "prefmatch.coordinator",
            top_k,
            over_fetch = fetch,
            result_count = ranked.len(),
            "search complete"
        );
        Ok(ranked)
    }

    /// Drop every user from the index.
    pub fn reset(&self) {
        let mut state = self.write_state();
        state.engine.reset();
        state.registry.clear();
        state.store.clear();
        drop(state);
        self.metrics.resets.fetch_add(1, Ordering::Relaxed);
        info!(target: "prefmatch.coordinator", "index cleared");
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let state = self.read_state();
        IndexStats {
            engine_size: state.engine.size(),
            registered_ids: state.registry.len(),
            stored_vectors: state.store.len(),
            dimension: self.config.dimension,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, IndexState<E>> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    target: "prefmatch.coordinator",
                    "poisoned index lock encountered; recovering inner state"
                );
                poisoned.into_inner()
            }
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, IndexState<E>> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    target: "prefmatch.coordinator",
                    "poisoned index lock encountered; recovering inner state"
                );
                poisoned.into_inner()
            }
        }
    }
}

/// Collapse repeated user ids, keeping first-appearance order and the last
/// submitted vector.
fn dedupe_last_wins(entries: Vec<UserVector>) -> Vec<UserVector> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    let mut deduped: Vec<UserVector> = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(&position) = positions.get(&entry.user_id) {
            deduped[position].vector = entry.vector;
        } else {
            positions.insert(entry.user_id.clone(), deduped.len());
            deduped.push(entry);
        }
    }
    deduped
}
