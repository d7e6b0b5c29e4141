use crate::error::Result;
use crate::models::*;
use crate::services::store::{CollectionStore, VectorStore};
use crate::utils::mean_vector;
use crate::utils::validation::validate_embedding;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rebuilds a user's taste vector as the mean of the content vectors of the
/// movies in their collection.
pub struct TasteProfileUpdater {
    collections: Arc<dyn CollectionStore>,
    vectors: Arc<dyn VectorStore>,
    dimension: usize,
}

impl TasteProfileUpdater {
    pub fn new(
        collections: Arc<dyn CollectionStore>,
        vectors: Arc<dyn VectorStore>,
        dimension: usize,
    ) -> Self {
        Self {
            collections,
            vectors,
            dimension,
        }
    }

    /// Full recompute from the current collection. Movies without a vector
    /// are left out of the mean; when none has one the stored profile is
    /// removed and `None` returned.
    pub async fn recompute(&self, user_id: UserId) -> Result<Option<TasteProfile>> {
        let entries = self.collections.collection(user_id).await?;

        let mut movie_ids: Vec<MovieId> = entries.iter().map(|e| e.movie_id).collect();
        movie_ids.sort_unstable();
        movie_ids.dedup();

        let vectors = self.vectors.movie_vectors(&movie_ids).await?;
        let usable: Vec<&[f32]> = vectors
            .iter()
            .filter(|(movie_id, vector)| {
                match validate_embedding(vector, self.dimension) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Ignoring vector for movie {}: {}", movie_id, e);
                        false
                    }
                }
            })
            .map(|(_, vector)| vector.as_slice())
            .collect();

        let mean = match mean_vector(usable.iter().copied()) {
            Some(mean) => mean,
            None => {
                debug!("No content vectors for user {}, clearing taste profile", user_id);
                self.vectors.delete_taste_profile(user_id).await?;
                return Ok(None);
            }
        };

        let profile = TasteProfile::new(user_id, mean);
        self.vectors.upsert_taste_profile(&profile).await?;

        info!(
            "Recomputed taste profile for user {} from {} of {} movies",
            user_id,
            usable.len(),
            movie_ids.len()
        );
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryStore;

    fn updater(store: &Arc<InMemoryStore>) -> TasteProfileUpdater {
        TasteProfileUpdater::new(store.clone(), store.clone(), 2)
    }

    #[tokio::test]
    async fn test_mean_over_movies_with_vectors() {
        let store = Arc::new(InMemoryStore::new(2));
        store.set_movie_vector(1, &[1.0, 0.0]).unwrap();
        store.set_movie_vector(2, &[0.0, 1.0]).unwrap();
        store.add_to_collection(7, CollectionEntry::favorite(1));
        store.add_to_collection(7, CollectionEntry::watchlist(2));
        store.add_to_collection(7, CollectionEntry::favorite(3));

        let profile = updater(&store).recompute(7).await.unwrap().unwrap();
        assert_eq!(profile.embedding, vec![0.5, 0.5]);
        assert!(store.taste_profile(7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_no_vectors_leaves_profile_absent() {
        let store = Arc::new(InMemoryStore::new(2));
        store.add_to_collection(7, CollectionEntry::favorite(3));

        assert!(updater(&store).recompute(7).await.unwrap().is_none());
        assert!(store.taste_profile(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_profile_removed() {
        let store = Arc::new(InMemoryStore::new(2));
        store.set_movie_vector(1, &[1.0, 0.0]).unwrap();
        store.add_to_collection(7, CollectionEntry::favorite(1));
        updater(&store).recompute(7).await.unwrap();

        store.remove_from_collection(7, 1);
        assert!(updater(&store).recompute(7).await.unwrap().is_none());
        assert!(store.taste_profile(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_movie_in_both_lists_counted_once() {
        let store = Arc::new(InMemoryStore::new(2));
        store.set_movie_vector(1, &[1.0, 0.0]).unwrap();
        store.set_movie_vector(2, &[0.0, 1.0]).unwrap();
        store.add_to_collection(7, CollectionEntry::favorite(1));
        store.add_to_collection(7, CollectionEntry::watchlist(1));
        store.add_to_collection(7, CollectionEntry::favorite(2));

        let profile = updater(&store).recompute(7).await.unwrap().unwrap();
        assert_eq!(profile.embedding, vec![0.5, 0.5]);
    }
}
