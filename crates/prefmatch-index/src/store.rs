use std::collections::HashMap;

/// Raw preference vectors keyed by external id, kept so the reranker can
/// inspect which components were unknown. Last write wins.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    vectors: HashMap<String, Vec<f32>>,
}

impl VectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            vectors: HashMap::with_capacity(capacity),
        }
    }

    pub fn put(&mut self, external: impl Into<String>, vector: Vec<f32>) {
        self.vectors.insert(external.into(), vector);
    }

    #[must_use]
    pub fn get(&self, external: &str) -> Option<&[f32]> {
        self.vectors.get(external).map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
