pub mod enricher;

use crate::algorithms::{score_candidates, select_top_k, CandidateStore, GenreWeights};
use crate::config::RecommendationConfig;
use crate::error::{RecError, Result};
use crate::models::*;
use crate::services::cache::SnapshotCache;
use crate::services::collectors::{
    CollaborativeCollector, EmbeddingSimilarityCollector, GenreAffinityCollector,
};
use crate::services::profile::TasteProfileUpdater;
use crate::services::store::Stores;
use enricher::MetadataEnricher;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Hybrid recommendation pipeline plus the snapshot read path.
pub struct RecommendationEngine {
    stores: Stores,
    config: RecommendationConfig,
    profile_updater: TasteProfileUpdater,
    embedding_collector: EmbeddingSimilarityCollector,
    collaborative_collector: CollaborativeCollector,
    genre_collector: GenreAffinityCollector,
    enricher: MetadataEnricher,
    cache: Option<Arc<dyn SnapshotCache>>,
}

impl RecommendationEngine {
    pub fn new(stores: Stores, config: RecommendationConfig) -> Self {
        let profile_updater = TasteProfileUpdater::new(
            stores.collections.clone(),
            stores.vectors.clone(),
            config.embedding_dim,
        );
        let embedding_collector =
            EmbeddingSimilarityCollector::new(stores.vectors.clone(), config.embedding_pool);
        let collaborative_collector =
            CollaborativeCollector::new(stores.vectors.clone(), config.collaborative_pool);
        let genre_collector = GenreAffinityCollector::new(
            stores.catalog.clone(),
            stores.collections.clone(),
            config.genre_pool,
        );
        let enricher = MetadataEnricher::new(stores.catalog.clone());

        Self {
            stores,
            config,
            profile_updater,
            embedding_collector,
            collaborative_collector,
            genre_collector,
            enricher,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub async fn resolve_user(&self, email: &str) -> Result<UserId> {
        self.stores
            .identities
            .user_id_by_email(email)
            .await?
            .ok_or_else(|| RecError::UserNotFound(email.to_string()))
    }

    /// Taste profile update followed by a full recommendation recompute.
    /// A failing profile update is logged and the run continues on
    /// whatever signals remain.
    pub async fn recompute_recommendations(&self, user_id: UserId) -> Result<ComputeSummary> {
        if let Err(e) = self.profile_updater.recompute(user_id).await {
            error!("Failed to recompute taste profile for user {}: {}", user_id, e);
        }

        self.compute_recommendations(user_id).await.map_err(|e| {
            error!("Failed to compute recommendations for user {}: {}", user_id, e);
            e
        })
    }

    pub async fn recompute_for_email(&self, email: &str) -> Result<ComputeSummary> {
        let user_id = self.resolve_user(email).await?;
        let summary = self.recompute_recommendations(user_id).await?;
        info!("Successfully updated recommendations for user: {}", email);
        Ok(summary)
    }

    pub async fn compute_recommendations(&self, user_id: UserId) -> Result<ComputeSummary> {
        let collection = self.stores.collections.collection(user_id).await?;
        if collection.is_empty() {
            self.replace_snapshot(user_id, Vec::new()).await?;
            debug!("User {} has an empty collection, nothing to recommend", user_id);
            return Ok(ComputeSummary::default());
        }

        let exclude: HashSet<MovieId> = collection.iter().map(|e| e.movie_id).collect();

        let profile = match self.stores.vectors.taste_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Failed to load taste profile for user {}: {}", user_id, e);
                None
            }
        };

        let (genre_signal, similar, neighbors) = futures::join!(
            self.collect_genre(user_id, &exclude),
            self.collect_similar(profile.as_ref(), &exclude),
            self.collect_neighbors(profile.as_ref(), &exclude),
        );
        let (genre_weights, genre_movies) = genre_signal;

        let mut candidates = CandidateStore::new();
        EmbeddingSimilarityCollector::merge(&mut candidates, &similar);
        CollaborativeCollector::merge(&mut candidates, &neighbors);
        GenreAffinityCollector::merge(&mut candidates, &genre_movies);

        if let Err(e) = self.enricher.enrich(&mut candidates).await {
            warn!("Failed to enrich candidate metadata for user {}: {}", user_id, e);
        }

        score_candidates(&mut candidates, &genre_weights);

        let candidate_count = candidates.len();
        let entries = select_top_k(candidates.into_candidates(), self.config.snapshot_size);
        let persisted = entries.len();
        self.replace_snapshot(user_id, entries).await?;

        info!(
            "Computed {} recommendations for user {} (from {} candidates)",
            persisted, user_id, candidate_count
        );

        Ok(ComputeSummary {
            candidate_count,
            persisted,
            used_taste_profile: profile.is_some(),
        })
    }

    async fn collect_genre(
        &self,
        user_id: UserId,
        exclude: &HashSet<MovieId>,
    ) -> (GenreWeights, Vec<MovieMetadata>) {
        let weights = match self.genre_collector.genre_weights(user_id).await {
            Ok(weights) => weights,
            Err(e) => {
                warn!("Failed to get genre preferences for user {}: {}", user_id, e);
                return (GenreWeights::default(), Vec::new());
            }
        };

        match self.genre_collector.collect(&weights, exclude).await {
            Ok(movies) => (weights, movies),
            Err(e) => {
                warn!("Failed to get genre candidates for user {}: {}", user_id, e);
                (weights, Vec::new())
            }
        }
    }

    async fn collect_similar(
        &self,
        profile: Option<&TasteProfile>,
        exclude: &HashSet<MovieId>,
    ) -> Vec<(MovieId, f64)> {
        let Some(profile) = profile else {
            return Vec::new();
        };
        self.embedding_collector
            .collect(profile, exclude)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to get embedding candidates for user {}: {}", profile.user_id, e);
                Vec::new()
            })
    }

    async fn collect_neighbors(
        &self,
        profile: Option<&TasteProfile>,
        exclude: &HashSet<MovieId>,
    ) -> Vec<CollectionEntry> {
        let Some(profile) = profile else {
            return Vec::new();
        };
        self.collaborative_collector
            .collect(profile, exclude)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to get collaborative candidates for user {}: {}", profile.user_id, e);
                Vec::new()
            })
    }

    /// Commit the snapshot, then mirror it into the cache. Both run on a
    /// spawned task so a caller that is dropped mid-way (queue timeout,
    /// client disconnect) cannot leave the cache behind the store.
    async fn replace_snapshot(&self, user_id: UserId, entries: Vec<RecommendationEntry>) -> Result<()> {
        let snapshots = self.stores.snapshots.clone();
        let cache = self.cache.clone();

        let persist = tokio::spawn(async move {
            let result = snapshots.replace_snapshot(user_id, &entries).await;
            if let Some(cache) = cache {
                match &result {
                    Ok(()) => cache.store(user_id, &entries).await,
                    Err(_) => cache.evict(user_id).await,
                }
            }
            result
        });

        persist.await.map_err(|e| {
            RecError::Storage(format!("snapshot persist for user {} aborted: {}", user_id, e))
        })?
    }

    pub async fn invalidate_recommendations(&self, user_id: UserId) -> Result<()> {
        let snapshots = self.stores.snapshots.clone();
        let cache = self.cache.clone();

        let invalidate = tokio::spawn(async move {
            let result = snapshots.invalidate_snapshot(user_id).await;
            if let Some(cache) = cache {
                cache.evict(user_id).await;
            }
            result
        });

        invalidate.await.map_err(|e| {
            RecError::Storage(format!("snapshot invalidation for user {} aborted: {}", user_id, e))
        })?
    }

    pub async fn has_recommendations(&self, user_id: UserId) -> Result<bool> {
        self.stores.snapshots.has_snapshot(user_id).await
    }

    /// Cached copy when present. A miss reads the store and leaves the
    /// cache alone; only the persist path writes it.
    async fn snapshot_entries(&self, user_id: UserId) -> Result<Vec<RecommendationEntry>> {
        if let Some(cache) = &self.cache {
            if let Some(entries) = cache.get(user_id).await {
                return Ok(entries);
            }
        }

        self.stores
            .snapshots
            .snapshot(user_id, self.config.snapshot_size)
            .await
    }

    /// Snapshot joined with current catalog rows, persisted score
    /// descending. Movies since removed from the catalog are dropped.
    pub async fn fetch_recommendations(&self, user_id: UserId, limit: usize) -> Result<Vec<MovieSummary>> {
        let mut entries = self.snapshot_entries(user_id).await?;
        entries.truncate(limit);
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<MovieId> = entries.iter().map(|e| e.movie_id).collect();
        let mut by_id: HashMap<MovieId, MovieSummary> = self
            .stores
            .catalog
            .movie_summaries(&ids)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Unknown users get an empty list rather than an error.
    pub async fn fetch_for_email(&self, email: &str, limit: usize) -> Result<Vec<MovieSummary>> {
        let user_id = match self.resolve_user(email).await {
            Ok(user_id) => user_id,
            Err(e) if e.is_not_found() => {
                debug!("No account for {}, returning no recommendations", email);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let movies = self.fetch_recommendations(user_id, limit).await?;
        debug!("Retrieved {} recommendations for user: {}", movies.len(), email);
        Ok(movies)
    }
}
