use super::{CatalogStore, CollectionStore, IdentityStore, SnapshotStore, VectorStore};
use crate::algorithms::retriever::InMemoryRetriever;
use crate::error::Result;
use crate::models::*;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone)]
struct CatalogMovie {
    summary: MovieSummary,
    genre_ids: Vec<GenreId>,
}

impl CatalogMovie {
    fn metadata(&self) -> MovieMetadata {
        MovieMetadata {
            movie_id: self.summary.id,
            score: self.summary.score,
            popularity: self.summary.popularity,
            genre_ids: self.genre_ids.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    deleted: bool,
}

/// Process-local implementation of every store trait.
pub struct InMemoryStore {
    movies: RwLock<HashMap<MovieId, CatalogMovie>>,
    accounts: RwLock<HashMap<String, Account>>,
    collections: RwLock<HashMap<UserId, Vec<CollectionEntry>>>,
    movie_retriever: RwLock<InMemoryRetriever>,
    user_retriever: RwLock<InMemoryRetriever>,
    profiles: RwLock<HashMap<UserId, TasteProfile>>,
    snapshots: RwLock<HashMap<UserId, RecommendationSnapshot>>,
}

impl InMemoryStore {
    pub fn new(dimension: usize) -> Self {
        info!("Initialized in-memory recommendation store with dimension {}", dimension);

        Self {
            movies: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            collections: RwLock::new(HashMap::new()),
            movie_retriever: RwLock::new(InMemoryRetriever::new(dimension)),
            user_retriever: RwLock::new(InMemoryRetriever::new(dimension)),
            profiles: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_movie(&self, summary: MovieSummary, genre_ids: Vec<GenreId>) {
        let mut genre_ids = genre_ids;
        genre_ids.sort_unstable();
        genre_ids.dedup();
        self.movies
            .write()
            .insert(summary.id, CatalogMovie { summary, genre_ids });
    }

    pub fn set_movie_vector(&self, movie_id: MovieId, vector: &[f32]) -> Result<()> {
        self.movie_retriever.write().upsert(movie_id, vector)
    }

    pub fn add_user(&self, user_id: UserId, email: &str) {
        self.accounts.write().insert(
            email.to_string(),
            Account {
                user_id,
                deleted: false,
            },
        );
    }

    pub fn soft_delete_user(&self, email: &str) -> bool {
        match self.accounts.write().get_mut(email) {
            Some(account) => {
                account.deleted = true;
                true
            }
            None => false,
        }
    }

    /// Returns false when the row was already present.
    pub fn add_to_collection(&self, user_id: UserId, entry: CollectionEntry) -> bool {
        let mut collections = self.collections.write();
        let entries = collections.entry(user_id).or_default();
        if entries.contains(&entry) {
            return false;
        }
        entries.push(entry);
        true
    }

    pub fn remove_from_collection(&self, user_id: UserId, movie_id: MovieId) -> usize {
        let mut collections = self.collections.write();
        match collections.get_mut(&user_id) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|e| e.movie_id != movie_id);
                before - entries.len()
            }
            None => 0,
        }
    }

    pub fn snapshot_record(&self, user_id: UserId) -> Option<RecommendationSnapshot> {
        self.snapshots.read().get(&user_id).cloned()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn movie_metadata(&self, movie_ids: &[MovieId]) -> Result<Vec<MovieMetadata>> {
        let movies = self.movies.read();
        Ok(movie_ids
            .iter()
            .filter_map(|id| movies.get(id).map(CatalogMovie::metadata))
            .collect())
    }

    async fn genre_candidates(
        &self,
        genre_ids: &[GenreId],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<MovieMetadata>> {
        let wanted: HashSet<GenreId> = genre_ids.iter().copied().collect();
        let movies = self.movies.read();

        let mut matches: Vec<(usize, &CatalogMovie)> = movies
            .values()
            .filter(|m| !exclude.contains(&m.summary.id))
            .map(|m| (m.genre_ids.iter().filter(|g| wanted.contains(g)).count(), m))
            .filter(|(count, _)| *count > 0)
            .collect();

        matches.sort_by(|(count_a, a), (count_b, b)| {
            count_b
                .cmp(count_a)
                .then_with(|| {
                    let score_a = a.summary.score.unwrap_or(f64::NEG_INFINITY);
                    let score_b = b.summary.score.unwrap_or(f64::NEG_INFINITY);
                    score_b.partial_cmp(&score_a).unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.summary.id.cmp(&b.summary.id))
        });

        Ok(matches
            .into_iter()
            .take(limit)
            .map(|(_, m)| m.metadata())
            .collect())
    }

    async fn movie_summaries(&self, movie_ids: &[MovieId]) -> Result<Vec<MovieSummary>> {
        let movies = self.movies.read();
        Ok(movie_ids
            .iter()
            .filter_map(|id| movies.get(id).map(|m| m.summary.clone()))
            .collect())
    }
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn collection(&self, user_id: UserId) -> Result<Vec<CollectionEntry>> {
        Ok(self
            .collections
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn collection_genre_counts(&self, user_id: UserId) -> Result<Vec<(GenreId, u64)>> {
        let collections = self.collections.read();
        let movies = self.movies.read();
        let mut counts: HashMap<GenreId, u64> = HashMap::new();

        for entry in collections.get(&user_id).into_iter().flatten() {
            if let Some(movie) = movies.get(&entry.movie_id) {
                for genre_id in &movie.genre_ids {
                    *counts.entry(*genre_id).or_insert(0) += 1;
                }
            }
        }

        let mut counts: Vec<(GenreId, u64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn movie_vectors(&self, movie_ids: &[MovieId]) -> Result<Vec<(MovieId, Vec<f32>)>> {
        let retriever = self.movie_retriever.read();
        Ok(movie_ids
            .iter()
            .filter_map(|id| retriever.get(*id).map(|v| (*id, v)))
            .collect())
    }

    async fn taste_profile(&self, user_id: UserId) -> Result<Option<TasteProfile>> {
        Ok(self.profiles.read().get(&user_id).cloned())
    }

    async fn upsert_taste_profile(&self, profile: &TasteProfile) -> Result<()> {
        self.user_retriever
            .write()
            .upsert(profile.user_id, &profile.embedding)?;
        self.profiles.write().insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn delete_taste_profile(&self, user_id: UserId) -> Result<()> {
        self.user_retriever.write().remove(user_id);
        self.profiles.write().remove(&user_id);
        Ok(())
    }

    async fn nearest_movies(
        &self,
        query: &[f32],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<(MovieId, f64)>> {
        self.movie_retriever
            .read()
            .search_similar(query, limit, |id| !exclude.contains(&id))
    }

    async fn neighbor_collections(
        &self,
        user_id: UserId,
        query: &[f32],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<CollectionEntry>> {
        let neighbors = {
            let retriever = self.user_retriever.read();
            let everyone = retriever.len();
            retriever.search_similar(query, everyone, |id| id != user_id)?
        };

        let collections = self.collections.read();
        Ok(neighbors
            .iter()
            .filter_map(|(neighbor, _)| collections.get(neighbor))
            .flatten()
            .filter(|entry| !exclude.contains(&entry.movie_id))
            .take(limit)
            .copied()
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn replace_snapshot(&self, user_id: UserId, entries: &[RecommendationEntry]) -> Result<()> {
        let mut snapshots = self.snapshots.write();
        snapshots.remove(&user_id);
        if !entries.is_empty() {
            snapshots.insert(
                user_id,
                RecommendationSnapshot {
                    user_id,
                    entries: entries.to_vec(),
                    computed_at: Utc::now(),
                },
            );
        }
        Ok(())
    }

    async fn invalidate_snapshot(&self, user_id: UserId) -> Result<()> {
        self.snapshots.write().remove(&user_id);
        Ok(())
    }

    async fn snapshot(&self, user_id: UserId, limit: usize) -> Result<Vec<RecommendationEntry>> {
        let snapshots = self.snapshots.read();
        let mut entries = snapshots
            .get(&user_id)
            .map(|s| s.entries.clone())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.movie_id.cmp(&b.movie_id)));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn has_snapshot(&self, user_id: UserId) -> Result<bool> {
        Ok(self.snapshots.read().contains_key(&user_id))
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn user_id_by_email(&self, email: &str) -> Result<Option<UserId>> {
        Ok(self
            .accounts
            .read()
            .get(email)
            .filter(|a| !a.deleted)
            .map(|a| a.user_id))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("movies", &self.movies.read().len())
            .field("users", &self.accounts.read().len())
            .field("profiles", &self.profiles.read().len())
            .field("snapshots", &self.snapshots.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new(2);
        store.add_movie(MovieSummary::new(1, "Heat", 1995).with_score(8.3), vec![28, 80]);
        store.add_movie(MovieSummary::new(2, "Ronin", 1998).with_score(7.2), vec![28]);
        store.add_movie(MovieSummary::new(3, "Amelie", 2001).with_score(8.3), vec![35, 10749]);
        store.add_movie(MovieSummary::new(4, "Collateral", 2004), vec![28, 80]);
        store
    }

    #[tokio::test]
    async fn test_genre_candidates_order() {
        let store = store();
        let exclude = HashSet::new();
        let found = store.genre_candidates(&[28, 80], &exclude, 10).await.unwrap();
        let ids: Vec<MovieId> = found.iter().map(|m| m.movie_id).collect();
        // two matching genres first, unscored movies last within a tier
        assert_eq!(ids, vec![1, 4, 2]);
    }

    #[tokio::test]
    async fn test_genre_candidates_exclude_and_limit() {
        let store = store();
        let exclude: HashSet<MovieId> = [1].into_iter().collect();
        let found = store.genre_candidates(&[28], &exclude, 1).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].movie_id, 2);
    }

    #[tokio::test]
    async fn test_replace_snapshot_with_nothing_removes_it() {
        let store = store();
        let entries = vec![RecommendationEntry { movie_id: 2, score: 0.4 }];
        store.replace_snapshot(7, &entries).await.unwrap();
        assert!(store.has_snapshot(7).await.unwrap());

        store.replace_snapshot(7, &[]).await.unwrap();
        assert!(!store.has_snapshot(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_soft_deleted_user_is_not_resolved() {
        let store = store();
        store.add_user(5, "a@example.com");
        assert_eq!(store.user_id_by_email("a@example.com").await.unwrap(), Some(5));
        assert!(store.soft_delete_user("a@example.com"));
        assert_eq!(store.user_id_by_email("a@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_collection_genre_counts() {
        let store = store();
        store.add_to_collection(9, CollectionEntry::favorite(1));
        store.add_to_collection(9, CollectionEntry::watchlist(2));
        assert!(!store.add_to_collection(9, CollectionEntry::watchlist(2)));

        let counts = store.collection_genre_counts(9).await.unwrap();
        assert_eq!(counts, vec![(28, 2), (80, 1)]);
    }
}
