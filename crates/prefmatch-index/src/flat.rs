//! Exact brute-force engine.
//!
//! Scans every live vector per query, keeping the best `k` in a bounded
//! max-heap. Ties are broken by insertion order, which makes result order
//! fully deterministic.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use prefmatch_core::{AnnEngine, AnnHits, MatchError, MatchResult};

const ENGINE_ID: &str = "flat";

#[derive(Debug, Clone)]
struct Entry {
    internal: i64,
    seq: u64,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    distance: f32,
    seq: u64,
    internal: i64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap keeps the worst candidate on top.
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Exact nearest-neighbor search over squared Euclidean distance.
#[derive(Debug, Clone)]
pub struct FlatEngine {
    entries: HashMap<i64, Entry>,
    next_seq: u64,
    dimension: usize,
}

impl FlatEngine {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            dimension,
        }
    }
}

impl AnnEngine for FlatEngine {
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
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(MatchError::EngineFailure {
                engine: ENGINE_ID,
                detail: format!(
                    "vector has {} components, engine expects {}",
                    bad.len(),
                    self.dimension
                ),
            });
        }
        for (&internal, vector) in ids.iter().zip(vectors) {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.entries.insert(
                internal,
                Entry {
                    internal,
                    seq,
                    vector: vector.clone(),
                },
            );
        }
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

        let mut heap = BinaryHeap::with_capacity(k.saturating_add(1));
        for entry in self.entries.values() {
            let candidate = HeapEntry {
                distance: squared_l2(query, &entry.vector),
                seq: entry.seq,
                internal: entry.internal,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek()
                && candidate < *worst
            {
                heap.pop();
                heap.push(candidate);
            }
        }

        for entry in heap.into_sorted_vec() {
            hits.push(entry.internal, entry.distance);
        }
        hits.pad_to(k);
        Ok(hits)
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
