use crate::algorithms::CandidateStore;
use crate::error::Result;
use crate::services::store::CatalogStore;
use std::sync::Arc;
use tracing::debug;

/// Backfills score, popularity and genres for candidates that only arrived
/// through the embedding or collaborative collectors.
pub struct MetadataEnricher {
    catalog: Arc<dyn CatalogStore>,
}

impl MetadataEnricher {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Returns how many candidates were filled. Movies missing from the
    /// catalog keep absent values.
    pub async fn enrich(&self, store: &mut CandidateStore) -> Result<usize> {
        let missing = store.missing_metadata();
        if missing.is_empty() {
            return Ok(0);
        }

        let found = self.catalog.movie_metadata(&missing).await?;
        let filled = found.iter().filter(|m| store.enrich(m)).count();

        debug!("Enriched {} of {} candidates lacking metadata", filled, missing.len());
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieSummary;
    use crate::services::store::InMemoryStore;

    #[tokio::test]
    async fn test_enrich_fills_known_movies_only() {
        let catalog = Arc::new(InMemoryStore::new(2));
        catalog.add_movie(
            MovieSummary::new(1, "Heat", 1995).with_score(8.3).with_popularity(61.0),
            vec![28, 80],
        );

        let mut store = CandidateStore::new();
        store.add_collaborative(1, 1.0);
        store.add_collaborative(2, 0.5);

        let filled = MetadataEnricher::new(catalog).enrich(&mut store).await.unwrap();
        assert_eq!(filled, 1);

        let heat = store.get(1).unwrap();
        assert_eq!(heat.score, Some(8.3));
        assert_eq!(heat.popularity, Some(61.0));
        assert_eq!(heat.genre_ids, vec![28, 80]);

        let unknown = store.get(2).unwrap();
        assert_eq!(unknown.score, None);
        assert!(unknown.genre_ids.is_empty());
    }
}
