//! Storage seams of the recommendation engine.
//!
//! The engine only talks to these traits. `memory` backs tests, benches and
//! demos; `postgres` is the production backend over pgvector.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::*;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Score, popularity and genres for the given movies. Unknown ids are
    /// simply absent from the result.
    async fn movie_metadata(&self, movie_ids: &[MovieId]) -> Result<Vec<MovieMetadata>>;

    /// Movies carrying any of `genre_ids`, minus `exclude`, ordered by number
    /// of matching genres desc, catalog score desc, id asc.
    async fn genre_candidates(
        &self,
        genre_ids: &[GenreId],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<MovieMetadata>>;

    async fn movie_summaries(&self, movie_ids: &[MovieId]) -> Result<Vec<MovieSummary>>;
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Every (movie, relation) row of the user's favorites and watchlist.
    async fn collection(&self, user_id: UserId) -> Result<Vec<CollectionEntry>>;

    /// How many collection rows carry each genre.
    async fn collection_genre_counts(&self, user_id: UserId) -> Result<Vec<(GenreId, u64)>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn movie_vectors(&self, movie_ids: &[MovieId]) -> Result<Vec<(MovieId, Vec<f32>)>>;

    async fn taste_profile(&self, user_id: UserId) -> Result<Option<TasteProfile>>;

    async fn upsert_taste_profile(&self, profile: &TasteProfile) -> Result<()>;

    async fn delete_taste_profile(&self, user_id: UserId) -> Result<()>;

    /// Movies most similar to `query` by cosine similarity, best first.
    async fn nearest_movies(
        &self,
        query: &[f32],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<(MovieId, f64)>>;

    /// Collection rows of other users with a taste profile, ordered by how
    /// close their profile is to `query`. Rows for `exclude` are dropped
    /// before `limit` applies.
    async fn neighbor_collections(
        &self,
        user_id: UserId,
        query: &[f32],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<CollectionEntry>>;
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Delete the user's snapshot and insert `entries` as one atomic step.
    async fn replace_snapshot(&self, user_id: UserId, entries: &[RecommendationEntry]) -> Result<()>;

    async fn invalidate_snapshot(&self, user_id: UserId) -> Result<()>;

    /// Persisted entries, score descending, at most `limit`.
    async fn snapshot(&self, user_id: UserId, limit: usize) -> Result<Vec<RecommendationEntry>>;

    async fn has_snapshot(&self, user_id: UserId) -> Result<bool>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Internal id of a live (not soft-deleted) user.
    async fn user_id_by_email(&self, email: &str) -> Result<Option<UserId>>;
}

/// The collaborators the engine needs, each behind its own trait object so a
/// single concern can be swapped out.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub collections: Arc<dyn CollectionStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub identities: Arc<dyn IdentityStore>,
}

impl Stores {
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: CatalogStore + CollectionStore + VectorStore + SnapshotStore + IdentityStore + 'static,
    {
        Self {
            catalog: store.clone(),
            collections: store.clone(),
            vectors: store.clone(),
            snapshots: store.clone(),
            identities: store,
        }
    }
}
