//! HNSW approximate nearest-neighbor engine backed by `hnsw_rs`.
//!
//! `hnsw_rs` graphs are append-only, so removal and replacement are handled
//! with tombstones: each graph point (data id) maps to an internal id or to
//! nothing. Searches over-fetch by the tombstone count and skip dead points.
//! Once tombstones outnumber live points the graph is rebuilt from the live
//! vectors.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use hnsw_rs::prelude::{DistL2, Hnsw};
use prefmatch_core::{AnnEngine, AnnHits, MatchConfig, MatchError, MatchResult};
use tracing::{debug, trace};

const ENGINE_ID: &str = "hnsw";
/// Initial capacity hint for a fresh graph.
const INITIAL_CAPACITY: usize = 1_024;
/// Tombstone count below which compaction never runs.
const MIN_COMPACT_TOMBSTONES: usize = 64;
const MAX_M: usize = 256;
const MAX_LAYER: usize = 16;

/// HNSW construction/runtime parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswConfig {
    /// HNSW `M` (max connections per node).
    pub m: usize,
    /// Build-time beam width.
    pub ef_construction: usize,
    /// Query-time beam width, raised to the fetch size when smaller.
    pub ef_search: usize,
    /// Maximum layer depth.
    pub max_layer: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::from_match_config(&MatchConfig::default())
    }
}

impl HnswConfig {
    #[must_use]
    pub const fn from_match_config(config: &MatchConfig) -> Self {
        Self {
            m: config.hnsw_m,
            ef_construction: config.hnsw_ef_construction,
            ef_search: config.hnsw_ef_search,
            max_layer: config.hnsw_max_layer,
        }
    }

    /// # Errors
    ///
    /// Returns `MatchError::InvalidConfig` for a zero or oversized parameter.
    pub fn validate(&self) -> MatchResult<()> {
        if self.m == 0 || self.m > MAX_M {
            return Err(invalid("hnsw_m", self.m, "hnsw_m must be in 1..=256"));
        }
        if self.ef_construction == 0 {
            return Err(invalid(
                "hnsw_ef_construction",
                self.ef_construction,
                "hnsw_ef_construction must be greater than zero",
            ));
        }
        if self.ef_search == 0 {
            return Err(invalid(
                "hnsw_ef_search",
                self.ef_search,
                "hnsw_ef_search must be greater than zero",
            ));
        }
        if self.max_layer == 0 || self.max_layer > MAX_LAYER {
            return Err(invalid(
                "hnsw_max_layer",
                self.max_layer,
                "hnsw_max_layer must be in 1..=16",
            ));
        }
        Ok(())
    }
}

/// HNSW engine over squared Euclidean distance.
pub struct HnswEngine {
    hnsw: Hnsw<'static, f32, DistL2>,
    /// Graph data id -> internal id; `None` marks a tombstone.
    slots: Vec<Option<i64>>,
    /// Graph data id -> vector, emptied when the slot is tombstoned.
    vectors: Vec<Vec<f32>>,
    /// Internal id -> graph data id, live entries only.
    live: HashMap<i64, usize>,
    dimension: usize,
    config: HnswConfig,
}

impl fmt::Debug for HnswEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnswEngine")
            .field("points", &self.hnsw.get_nb_point())
            .field("live", &self.live.len())
            .field("tombstones", &self.tombstones())
            .field("dimension", &self.dimension)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HnswEngine {
    /// Empty engine for `dimension`-length vectors.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::InvalidConfig` for a zero dimension or invalid
    /// HNSW parameters.
    pub fn new(dimension: usize, config: HnswConfig) -> MatchResult<Self> {
        config.validate()?;
        if dimension == 0 {
            return Err(invalid("dimension", 0, "dimension must be greater than zero"));
        }
        Ok(Self {
            hnsw: new_graph(&config, INITIAL_CAPACITY),
            slots: Vec::new(),
            vectors: Vec::new(),
            live: HashMap::new(),
            dimension,
            config,
        })
    }

    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn from_match_config(config: &MatchConfig) -> MatchResult<Self> {
        Self::new(config.dimension, HnswConfig::from_match_config(config))
    }

    #[must_use]
    pub const fn config(&self) -> HnswConfig {
        self.config
    }

    /// Dead graph points still waiting for compaction.
    #[must_use]
    pub fn tombstones(&self) -> usize {
        self.slots.len() - self.live.len()
    }

    fn tombstone(&mut self, internal: i64) {
        if let Some(slot) = self.live.remove(&internal) {
            self.slots[slot] = None;
            self.vectors[slot] = Vec::new();
        }
    }

    fn maybe_compact(&mut self) {
        let tombstones = self.tombstones();
        if tombstones < MIN_COMPACT_TOMBSTONES || tombstones <= self.live.len() {
            return;
        }
        let start = Instant::now();
        let mut slots = Vec::with_capacity(self.live.len());
        let mut vectors = Vec::with_capacity(self.live.len());
        for (slot, vector) in self.slots.iter().zip(self.vectors.iter_mut()) {
            if let Some(internal) = slot {
                slots.push(Some(*internal));
                vectors.push(std::mem::take(vector));
            }
        }
        let hnsw = new_graph(&self.config, slots.len().max(INITIAL_CAPACITY));
        if !vectors.is_empty() {
            let batch: Vec<(&Vec<f32>, usize)> = vectors
                .iter()
                .enumerate()
                .map(|(data_id, vector)| (vector, data_id))
                .collect();
            hnsw.parallel_insert(&batch);
        }
        self.live = slots
            .iter()
            .enumerate()
            .filter_map(|(data_id, slot)| slot.map(|internal| (internal, data_id)))
            .collect();
        self.hnsw = hnsw;
        self.slots = slots;
        self.vectors = vectors;
        debug!(
            target: "prefmatch.engine",
            engine = ENGINE_ID,
            dropped = tombstones,
            live = self.live.len(),
            elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
            "compacted hnsw graph"
        );
    }

    fn check_vector(&self, vector: &[f32]) -> MatchResult<()> {
        if vector.len() != self.dimension {
            return Err(MatchError::EngineFailure {
                engine: ENGINE_ID,
                detail: format!(
                    "vector has {} components, engine expects {}",
                    vector.len(),
                    self.dimension
                ),
            });
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(MatchError::EngineFailure {
                engine: ENGINE_ID,
                detail: "all vector values must be finite".to_owned(),
            });
        }
        Ok(())
    }
}

impl AnnEngine for HnswEngine {
    fn id(&self) -> &'static str {
        ENGINE_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn insert(&mut self, ids: &[i64], vectors: &[Vec<f32>]) -> MatchResult<()> {
        if ids.len() != vectors.len() {
            return Err(MatchError::EngineFailure {
                engine: ENGINE_ID,
                detail: format!("{} ids for {} vectors", ids.len(), vectors.len()),
            });
        }
        for vector in vectors {
            self.check_vector(vector)?;
        }

        let mut new_slots = Vec::with_capacity(ids.len());
        for (&internal, vector) in ids.iter().zip(vectors) {
            self.tombstone(internal);
            let data_id = self.slots.len();
            self.slots.push(Some(internal));
            self.vectors.push(vector.clone());
            self.live.insert(internal, data_id);
            new_slots.push(data_id);
        }

        // A repeated id within one batch tombstones its earlier slot.
        let batch: Vec<(&Vec<f32>, usize)> = new_slots
            .iter()
            .filter(|&&data_id| self.slots[data_id].is_some())
            .map(|&data_id| (&self.vectors[data_id], data_id))
            .collect();
        if !batch.is_empty() {
            self.hnsw.parallel_insert(&batch);
        }

        self.maybe_compact();
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> MatchResult<AnnHits> {
        if query.len() != self.dimension {
            return Err(MatchError::QueryDimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }
        let mut hits = AnnHits::with_capacity(k);
        if k == 0 {
            return Ok(hits);
        }
        if self.live.is_empty() {
            hits.pad_to(k);
            return Ok(hits);
        }

        let fetch = k.saturating_add(self.tombstones()).min(self.slots.len());
        let ef = self.config.ef_search.max(fetch);
        let neighbours = self.hnsw.search(query, fetch, ef);
        for neighbour in &neighbours {
            if let Some(Some(internal)) = self.slots.get(neighbour.d_id) {
                // DistL2 reports the Euclidean norm; callers expect its square.
                hits.push(*internal, neighbour.distance * neighbour.distance);
                if hits.len() == k {
                    break;
                }
            }
        }
        trace!(
            target: "prefmatch.engine",
            engine = ENGINE_ID,
            k,
            fetch,
            ef,
            returned = hits.len(),
            "hnsw search"
        );
        hits.pad_to(k);
        Ok(hits)
    }

    fn reset(&mut self) {
        self.hnsw = new_graph(&self.config, INITIAL_CAPACITY);
        self.slots.clear();
        self.vectors.clear();
        self.live.clear();
    }

    fn size(&self) -> usize {
        self.live.len()
    }
}

fn new_graph(config: &HnswConfig, capacity: usize) -> Hnsw<'static, f32, DistL2> {
    Hnsw::new(
        config.m,
        capacity.max(1),
        config.max_layer,
        config.ef_construction,
        DistL2 {},
    )
}

fn invalid(field: &str, value: usize, reason: &str) -> MatchError {
    MatchError::InvalidConfig {
        field: field.to_owned(),
        value: value.to_string(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use prefmatch_core::NO_MATCH_ID;

    use super::*;
    use crate::flat::FlatEngine;

    fn lcg_next(state: &mut u64) -> u32 {
        *state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        u32::try_from((*state >> 32) & u64::from(u32::MAX)).unwrap_or(u32::MAX)
    }

    fn random_vector(seed: usize, dimension: usize) -> Vec<f32> {
        let mut state = u64::try_from(seed).unwrap_or(0).wrapping_add(1);
        (0..dimension)
            .map(|_| {
                let upper = u16::try_from(lcg_next(&mut state) >> 16).unwrap_or(u16::MAX);
                f32::from(upper) / f32::from(u16::MAX) * 2.0
            })
            .collect()
    }

    fn engine(dimension: usize) -> HnswEngine {
        HnswEngine::new(dimension, HnswConfig::default()).expect("engine")
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = HnswConfig {
            m: 0,
            ..HnswConfig::default()
        };
        assert!(matches!(
            HnswEngine::new(8, config).unwrap_err(),
            MatchError::InvalidConfig { .. }
        ));
        assert!(HnswEngine::new(0, HnswConfig::default()).is_err());
        let config = HnswConfig {
            max_layer: 17,
            ..HnswConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_engine_pads_with_no_match() {
        let engine = engine(4);
        let hits = engine.search(&[0.0; 4], 3).expect("search");
        assert_eq!(hits.ids, vec![NO_MATCH_ID; 3]);
        assert!(hits.scores.iter().all(|s| s.is_infinite()));
    }

    #[test]
    fn query_dimension_is_checked() {
        let engine = engine(4);
        assert!(matches!(
            engine.search(&[0.0; 3], 1).unwrap_err(),
            MatchError::QueryDimensionMismatch { expected: 4, found: 3 }
        ));
    }

    #[test]
    fn reports_squared_distance() {
        let mut engine = engine(4);
        engine
            .insert(&[10, 20], &[vec![0.0, 0.0, 0.0, 0.0], vec![3.0, 4.0, 0.0, 0.0]])
            .expect("insert");
        let hits = engine.search(&[0.0; 4], 2).expect("search");
        assert_eq!(hits.ids, vec![10, 20]);
        assert!(hits.scores[0].abs() < 1e-5);
        assert!((hits.scores[1] - 25.0).abs() < 1e-3);
    }

    #[test]
    fn reinsert_replaces_previous_vector() {
        let mut engine = engine(2);
        engine.insert(&[1], &[vec![0.0, 0.0]]).expect("insert");
        engine.insert(&[2], &[vec![5.0, 5.0]]).expect("insert");
        engine.insert(&[1], &[vec![10.0, 10.0]]).expect("reinsert");
        assert_eq!(engine.size(), 2);
        assert_eq!(engine.tombstones(), 1);

        let hits = engine.search(&[0.0, 0.0], 3).expect("search");
        assert_eq!(hits.ids, vec![2, 1, NO_MATCH_ID]);
        assert!((hits.scores[1] - 200.0).abs() < 1e-2);
    }

    #[test]
    fn duplicate_ids_in_one_batch_keep_last() {
        let mut engine = engine(2);
        engine
            .insert(&[1, 1], &[vec![0.0, 0.0], vec![1.0, 0.0]])
            .expect("insert");
        assert_eq!(engine.size(), 1);
        let hits = engine.search(&[1.0, 0.0], 1).expect("search");
        assert_eq!(hits.ids, vec![1]);
        assert!(hits.scores[0].abs() < 1e-5);
    }

    #[test]
    fn reset_drops_graph_and_tombstones() {
        let mut engine = engine(2);
        engine
            .insert(&[1, 2], &[vec![0.0, 0.0], vec![1.0, 1.0]])
            .expect("insert");
        engine.insert(&[1], &[vec![3.0, 3.0]]).expect("reinsert");
        assert_eq!(engine.tombstones(), 1);

        engine.reset();
        assert_eq!(engine.size(), 0);
        assert_eq!(engine.tombstones(), 0);
        engine.insert(&[3], &[vec![0.5, 0.5]]).expect("insert after reset");
        assert_eq!(engine.search(&[0.0, 0.0], 1).expect("search").ids, vec![3]);
    }

    #[test]
    fn misaligned_or_bad_batches_fail() {
        let mut engine = engine(2);
        assert!(engine.insert(&[1, 2], &[vec![0.0, 0.0]]).is_err());
        assert!(engine.insert(&[1], &[vec![0.0]]).is_err());
        assert!(engine.insert(&[1], &[vec![f32::NAN, 0.0]]).is_err());
        assert_eq!(engine.size(), 0);
    }

    #[test]
    fn repeated_reloads_trigger_compaction() {
        let mut engine = engine(4);
        let ids: Vec<i64> = (0..100).collect();
        let round = |offset: usize| -> Vec<Vec<f32>> {
            (0..100).map(|i| random_vector(i + offset, 4)).collect()
        };

        engine.insert(&ids, &round(0)).expect("first round");
        engine.insert(&ids, &round(1_000)).expect("second round");
        // Tombstones equal the live count, which is not enough to compact.
        assert_eq!(engine.tombstones(), 100);

        let latest = round(2_000);
        engine.insert(&ids, &latest).expect("third round");
        assert_eq!(engine.tombstones(), 0);
        assert_eq!(engine.size(), 100);

        let hits = engine.search(&latest[42], 1).expect("search");
        assert_eq!(hits.ids, vec![42]);
        assert!(hits.scores[0].abs() < 1e-5);
    }

    #[test]
    fn recall_against_exact_scan_is_high() {
        let dimension = 8;
        let count = 500;
        let ids: Vec<i64> = (0..count).collect();
        let vectors: Vec<Vec<f32>> = (0..500).map(|i| random_vector(i, dimension)).collect();

        let mut approx = engine(dimension);
        let mut exact = FlatEngine::new(dimension);
        approx.insert(&ids, &vectors).expect("insert");
        exact.insert(&ids, &vectors).expect("insert");

        let k = 10;
        let mut overlap = 0_usize;
        for seed in 0..20 {
            let query = random_vector(10_000 + seed, dimension);
            let a: HashSet<i64> = approx.search(&query, k).expect("search").ids.into_iter().collect();
            let e = exact.search(&query, k).expect("search").ids;
            overlap += e.iter().filter(|id| a.contains(id)).count();
        }
        // 200 exact neighbours in total; demand at least 90% recall.
        assert!(overlap >= 180, "recall too low: {overlap}/200");
    }
}
