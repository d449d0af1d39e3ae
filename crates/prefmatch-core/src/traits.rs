//! Seams between the matching core and its collaborators.
//!
//! [`AnnEngine`] is the consumed approximate-nearest-neighbor capability.
//! [`VectorSource`] supplies full snapshots for scheduled bulk refreshes.

use std::fmt;

use crate::error::MatchResult;
use crate::types::{AnnHits, UserVector};

/// Approximate k-nearest-neighbor engine over vectors tagged with integer ids.
///
/// Implementations are not internally synchronized for mutation: callers hold
/// exclusive access (`&mut self`) for `insert` and `reset`, and
/// shared access for `search`. The coordinator owns the only handle.
pub trait AnnEngine: fmt::Debug + Send + Sync {
    /// Short engine identifier for logs and errors.
    fn id(&self) -> &'static str;

    /// Vector dimensionality accepted by this engine.
    fn dimension(&self) -> usize;

    /// Add entries. `ids` and `vectors` are index-aligned.
    ///
    /// Re-inserting an id that is already present replaces its previous entry.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::EngineFailure` when the slices are misaligned or a
    /// vector has the wrong dimension.
    fn insert(&mut self, ids: &[i64], vectors: &[Vec<f32>]) -> MatchResult<()>;

    /// Return `k` slots in ascending distance order. Slots beyond the number
    /// of live entries carry [`NO_MATCH_ID`](crate::types::NO_MATCH_ID).
    ///
    /// # Errors
    ///
    /// Returns `MatchError::QueryDimensionMismatch` for a wrongly sized query.
    fn search(&self, query: &[f32], k: usize) -> MatchResult<AnnHits>;

    /// Drop every entry.
    fn reset(&mut self);

    /// Number of live entries.
    fn size(&self) -> usize;
}

impl<E: AnnEngine + ?Sized> AnnEngine for Box<E> {
    fn id(&self) -> &'static str {
        (**self).id()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn insert(&mut self, ids: &[i64], vectors: &[Vec<f32>]) -> MatchResult<()> {
        (**self).insert(ids, vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> MatchResult<AnnHits> {
        (**self).search(query, k)
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}

/// Source of complete user-vector snapshots for bulk refresh.
pub trait VectorSource: Send + Sync {
    /// Human-readable source name.
    fn name(&self) -> &str;

    /// Read every user vector currently known to the source.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::SourceUnavailable` when the backing store cannot
    /// be read.
    fn snapshot(&self) -> MatchResult<Vec<UserVector>>;
}

/// In-memory source, mostly useful for tests and one-shot loads.
#[derive(Debug, Clone, Default)]
pub struct StaticVectorSource {
    name: String,
    vectors: Vec<UserVector>,
}

impl StaticVectorSource {
    #[must_use]
    pub fn new(name: impl Into<String>, vectors: Vec<UserVector>) -> Self {
        Self {
            name: name.into(),
            vectors,
        }
    }
}

impl VectorSource for StaticVectorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self) -> MatchResult<Vec<UserVector>> {
        Ok(self.vectors.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_returns_its_vectors() {
        let source = StaticVectorSource::new(
            "fixture",
            vec![UserVector::new("a", vec![1.0, 0.0])],
        );
        assert_eq!(source.name(), "fixture");
        let snapshot = source.snapshot().expect("snapshot");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].user_id, "a");
    }

    #[test]
    fn traits_are_object_safe() {
        fn takes_source(_: &dyn VectorSource) {}
        fn takes_engine(_: &dyn AnnEngine) {}
        takes_source(&StaticVectorSource::default());
        let _ = takes_engine;
    }
}
