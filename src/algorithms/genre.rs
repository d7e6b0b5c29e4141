use crate::models::GenreId;
use std::collections::{HashMap, HashSet};

/// Per-user genre preference: how often each genre occurs across the user's
/// collection, normalized so the weights sum to 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenreWeights {
    weights: HashMap<GenreId, f64>,
}

impl GenreWeights {
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (GenreId, u64)>,
    {
        let mut weights: HashMap<GenreId, f64> = HashMap::new();
        for (genre_id, count) in counts {
            if count > 0 {
                *weights.entry(genre_id).or_insert(0.0) += count as f64;
            }
        }

        let total: f64 = weights.values().sum();
        if total > 0.0 {
            for weight in weights.values_mut() {
                *weight /= total;
            }
        }

        Self { weights }
    }

    pub fn weight(&self, genre_id: GenreId) -> f64 {
        self.weights.get(&genre_id).copied().unwrap_or(0.0)
    }

    /// Sum of weights over a movie's distinct genres. Genres the user never
    /// interacted with contribute nothing.
    pub fn affinity(&self, genre_ids: &[GenreId]) -> f64 {
        if self.weights.is_empty() {
            return 0.0;
        }
        let mut seen = HashSet::with_capacity(genre_ids.len());
        genre_ids
            .iter()
            .filter(|g| seen.insert(**g))
            .map(|g| self.weight(*g))
            .sum()
    }

    /// Weighted genre ids in ascending order.
    pub fn genre_ids(&self) -> Vec<GenreId> {
        let mut ids: Vec<GenreId> = self.weights.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
