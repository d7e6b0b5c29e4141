use crate::error::{RecError, Result};
use crate::utils::validation::validate_embedding;
use nalgebra::DVector;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Brute-force cosine index keyed by movie or user id.
#[derive(Debug, Clone)]
pub struct InMemoryRetriever {
    vectors: HashMap<i64, DVector<f32>>,
    dimension: usize,
}

impl InMemoryRetriever {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            dimension,
        }
    }

    fn cosine_similarity(a: &DVector<f32>, b: &DVector<f32>) -> f32 {
        let dot_product = a.dot(b);
        let norm_a = a.norm();
        let norm_b = b.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot_product / (norm_a * norm_b)
        }
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len != self.dimension {
            return Err(RecError::DimensionMismatch {
                expected: self.dimension,
                actual: len,
            });
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn upsert(&mut self, id: i64, vector: &[f32]) -> Result<()> {
        validate_embedding(vector, self.dimension)?;
        self.vectors.insert(id, DVector::from_column_slice(vector));
        Ok(())
    }

    pub fn remove(&mut self, id: i64) -> bool {
        self.vectors.remove(&id).is_some()
    }

    pub fn get(&self, id: i64) -> Option<Vec<f32>> {
        self.vectors.get(&id).map(|v| v.as_slice().to_vec())
    }

    pub fn contains(&self, id: i64) -> bool {
        self.vectors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Ids ranked by cosine similarity to `query`, best first, ties by
    /// ascending id. Ids rejected by `keep` are skipped before truncation.
    pub fn search_similar<F>(&self, query: &[f32], top_k: usize, keep: F) -> Result<Vec<(i64, f64)>>
    where
        F: Fn(i64) -> bool,
    {
        self.check_dimension(query.len())?;

        let query = DVector::from_column_slice(query);
        let mut similarities: Vec<(i64, f64)> = self
            .vectors
            .iter()
            .filter(|(id, _)| keep(**id))
            .map(|(id, vector)| (*id, Self::cosine_similarity(&query, vector) as f64))
            .collect();

        similarities.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        similarities.truncate(top_k);
        Ok(similarities)
    }
}
