//! Independent candidate sources. Each collector only queries; merging into
//! the run's `CandidateStore` is a separate, infallible step.

use crate::algorithms::{CandidateStore, GenreWeights};
use crate::error::Result;
use crate::models::*;
use crate::services::store::{CatalogStore, CollectionStore, VectorStore};
use std::collections::HashSet;
use std::sync::Arc;

/// Nearest movies to the user's taste vector.
pub struct EmbeddingSimilarityCollector {
    vectors: Arc<dyn VectorStore>,
    pool_size: usize,
}

impl EmbeddingSimilarityCollector {
    pub fn new(vectors: Arc<dyn VectorStore>, pool_size: usize) -> Self {
        Self { vectors, pool_size }
    }

    pub async fn collect(
        &self,
        profile: &TasteProfile,
        exclude: &HashSet<MovieId>,
    ) -> Result<Vec<(MovieId, f64)>> {
        self.vectors
            .nearest_movies(&profile.embedding, exclude, self.pool_size)
            .await
    }

    pub fn merge(store: &mut CandidateStore, hits: &[(MovieId, f64)]) {
        for (movie_id, similarity) in hits {
            store.record_similarity(*movie_id, *similarity);
        }
    }
}

/// Movies collected by users whose taste vectors sit closest to this one.
pub struct CollaborativeCollector {
    vectors: Arc<dyn VectorStore>,
    pool_size: usize,
}

impl CollaborativeCollector {
    pub fn new(vectors: Arc<dyn VectorStore>, pool_size: usize) -> Self {
        Self { vectors, pool_size }
    }

    pub async fn collect(
        &self,
        profile: &TasteProfile,
        exclude: &HashSet<MovieId>,
    ) -> Result<Vec<CollectionEntry>> {
        self.vectors
            .neighbor_collections(profile.user_id, &profile.embedding, exclude, self.pool_size)
            .await
    }

    /// Favorites add 1.0, watchlist entries 0.5; repeats accumulate.
    pub fn merge(store: &mut CandidateStore, entries: &[CollectionEntry]) {
        for entry in entries {
            store.add_collaborative(entry.movie_id, entry.relation.collaborative_weight());
        }
    }
}

/// Genre preference from the user's own history. Needs no embeddings.
pub struct GenreAffinityCollector {
    catalog: Arc<dyn CatalogStore>,
    collections: Arc<dyn CollectionStore>,
    pool_size: usize,
}

impl GenreAffinityCollector {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        collections: Arc<dyn CollectionStore>,
        pool_size: usize,
    ) -> Self {
        Self {
            catalog,
            collections,
            pool_size,
        }
    }

    pub async fn genre_weights(&self, user_id: UserId) -> Result<GenreWeights> {
        let counts = self.collections.collection_genre_counts(user_id).await?;
        Ok(GenreWeights::from_counts(counts))
    }

    pub async fn collect(
        &self,
        weights: &GenreWeights,
        exclude: &HashSet<MovieId>,
    ) -> Result<Vec<MovieMetadata>> {
        if weights.is_empty() {
            return Ok(Vec::new());
        }
        self.catalog
            .genre_candidates(&weights.genre_ids(), exclude, self.pool_size)
            .await
    }

    pub fn merge(store: &mut CandidateStore, movies: &[MovieMetadata]) {
        for metadata in movies {
            store.merge_metadata(metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryStore;

    #[test]
    fn test_collaborative_merge_accumulates() {
        let mut store = CandidateStore::new();
        CollaborativeCollector::merge(
            &mut store,
            &[
                CollectionEntry::favorite(4),
                CollectionEntry::watchlist(4),
                CollectionEntry::favorite(4),
                CollectionEntry::watchlist(5),
            ],
        );
        assert_eq!(store.get(4).unwrap().collaborative_score, 2.5);
        assert_eq!(store.get(5).unwrap().collaborative_score, 0.5);
    }

    #[tokio::test]
    async fn test_genre_collector_without_history_is_empty() {
        let store = Arc::new(InMemoryStore::new(2));
        store.add_movie(MovieSummary::new(1, "Heat", 1995), vec![28]);
        let collector = GenreAffinityCollector::new(store.clone(), store.clone(), 200);

        let weights = collector.genre_weights(99).await.unwrap();
        assert!(weights.is_empty());
        assert!(collector.collect(&weights, &HashSet::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_collector_respects_pool_and_exclusion() {
        let store = Arc::new(InMemoryStore::new(2));
        for id in 1..=5 {
            store.set_movie_vector(id, &[1.0, id as f32 / 10.0]).unwrap();
        }
        let collector = EmbeddingSimilarityCollector::new(store.clone(), 2);
        let profile = TasteProfile::new(1, vec![1.0, 0.0]);
        let exclude: HashSet<MovieId> = [1].into_iter().collect();

        let hits = collector.collect(&profile, &exclude).await.unwrap();
        let ids: Vec<MovieId> = hits.iter().map(|h| h.0).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
