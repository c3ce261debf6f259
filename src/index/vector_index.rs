//! Vector index: mapping from key to a dense numeric vector extracted
//! from values shaped as `{"vector": [...]}`.

use std::collections::HashMap;

/// Dense-vector secondary index. Enumeration order is insertion order of
/// the backing map's iteration, which is implementation-defined (see
/// `Engine::vector_search` for the tie-breaking note).
#[derive(Debug, Default)]
pub struct VectorIndex {
    vectors: HashMap<String, Vec<f64>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, vector: Vec<f64>) {
        self.vectors.insert(key.to_string(), vector);
    }

    pub fn remove(&mut self, key: &str) {
        self.vectors.remove(key);
    }

    /// Iterate over `(key, vector)` pairs for scoring.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.vectors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove() {
        let mut idx = VectorIndex::new();
        idx.add("v1", vec![1.0, 0.0]);
        assert_eq!(idx.iter().count(), 1);
        idx.remove("v1");
        assert_eq!(idx.iter().count(), 0);
    }

    #[test]
    fn overwrite_replaces_vector() {
        let mut idx = VectorIndex::new();
        idx.add("v1", vec![1.0, 0.0]);
        idx.add("v1", vec![0.0, 1.0]);
        let (_, v) = idx.iter().next().unwrap();
        assert_eq!(v, &[0.0, 1.0]);
    }
}
