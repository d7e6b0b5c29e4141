use super::{CatalogStore, CollectionStore, IdentityStore, SnapshotStore, VectorStore};
use crate::config::PostgresConfig;
use crate::error::Result;
use crate::models::*;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// pgvector-backed store over the catalog, collection and recommendation
/// tables. Vectors travel as `real[]` and are cast to `vector` in SQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

const METADATA_COLUMNS: &str = "
    m.id::int8 AS id,
    m.score::float8 AS score,
    m.popularity::float8 AS popularity,
    COALESCE(
        (SELECT array_agg(g.genre_id::int4 ORDER BY g.genre_id) FROM movie_genres g WHERE g.movie_id = m.id),
        '{}'
    ) AS genre_ids";

impl PgStore {
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        info!("Connected to PostgreSQL with {} max connections", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn exclusion_list(exclude: &HashSet<MovieId>) -> Vec<MovieId> {
    let mut ids: Vec<MovieId> = exclude.iter().copied().collect();
    ids.sort_unstable();
    ids
}

fn metadata_from_row(row: &PgRow) -> Result<MovieMetadata> {
    Ok(MovieMetadata {
        movie_id: row.try_get("id")?,
        score: row.try_get("score")?,
        popularity: row.try_get("popularity")?,
        genre_ids: row.try_get("genre_ids")?,
    })
}

fn entries_from_rows(rows: &[PgRow]) -> Result<Vec<CollectionEntry>> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let movie_id: MovieId = row.try_get("movie_id")?;
        let relation: String = row.try_get("relation_type")?;
        match RelationType::parse(&relation) {
            Some(relation) => entries.push(CollectionEntry { movie_id, relation }),
            None => warn!("Skipping collection row for movie {} with relation {:?}", movie_id, relation),
        }
    }
    Ok(entries)
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn movie_metadata(&self, movie_ids: &[MovieId]) -> Result<Vec<MovieMetadata>> {
        if movie_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("SELECT {} FROM movies m WHERE m.id = ANY($1)", METADATA_COLUMNS);
        let rows = sqlx::query(&query)
            .bind(movie_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(metadata_from_row).collect()
    }

    async fn genre_candidates(
        &self,
        genre_ids: &[GenreId],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<MovieMetadata>> {
        if genre_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {}
             FROM movies m
             JOIN movie_genres mg ON mg.movie_id = m.id
             WHERE mg.genre_id = ANY($1)
               AND NOT (m.id = ANY($2))
             GROUP BY m.id, m.score, m.popularity
             ORDER BY COUNT(DISTINCT mg.genre_id) DESC, m.score DESC NULLS LAST, m.id ASC
             LIMIT $3",
            METADATA_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(genre_ids)
            .bind(exclusion_list(exclude))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(metadata_from_row).collect()
    }

    async fn movie_summaries(&self, movie_ids: &[MovieId]) -> Result<Vec<MovieSummary>> {
        if movie_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT m.id::int8 AS id, m.tmdb_id::int8 AS tmdb_id, m.title, m.tagline,
                    m.release_year::int4 AS release_year, m.overview,
                    m.score::float8 AS score, m.popularity::float8 AS popularity,
                    m.language, m.poster_url, m.trailer_url
             FROM movies m
             WHERE m.id = ANY($1)",
        )
        .bind(movie_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            summaries.push(MovieSummary {
                id: row.try_get("id")?,
                tmdb_id: row.try_get("tmdb_id")?,
                title: row.try_get("title")?,
                tagline: row.try_get("tagline")?,
                release_year: row.try_get("release_year")?,
                overview: row.try_get("overview")?,
                score: row.try_get("score")?,
                popularity: row.try_get("popularity")?,
                language: row.try_get("language")?,
                poster_url: row.try_get("poster_url")?,
                trailer_url: row.try_get("trailer_url")?,
            });
        }
        Ok(summaries)
    }
}

#[async_trait]
impl CollectionStore for PgStore {
    async fn collection(&self, user_id: UserId) -> Result<Vec<CollectionEntry>> {
        let rows = sqlx::query(
            "SELECT movie_id::int8 AS movie_id, relation_type
             FROM user_movies
             WHERE user_id = $1
             ORDER BY movie_id, relation_type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        entries_from_rows(&rows)
    }

    async fn collection_genre_counts(&self, user_id: UserId) -> Result<Vec<(GenreId, u64)>> {
        let rows = sqlx::query(
            "SELECT mg.genre_id::int4 AS genre_id, COUNT(*) AS cnt
             FROM user_movies um
             JOIN movie_genres mg ON mg.movie_id = um.movie_id
             WHERE um.user_id = $1
             GROUP BY mg.genre_id
             ORDER BY cnt DESC, mg.genre_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in &rows {
            let genre_id: GenreId = row.try_get("genre_id")?;
            let count: i64 = row.try_get("cnt")?;
            counts.push((genre_id, count.max(0) as u64));
        }
        Ok(counts)
    }
}

#[async_trait]
impl VectorStore for PgStore {
    async fn movie_vectors(&self, movie_ids: &[MovieId]) -> Result<Vec<(MovieId, Vec<f32>)>> {
        if movie_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT movie_id::int8 AS movie_id, embedding::real[] AS embedding
             FROM movie_embeddings
             WHERE movie_id = ANY($1)",
        )
        .bind(movie_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut vectors = Vec::with_capacity(rows.len());
        for row in &rows {
            vectors.push((row.try_get("movie_id")?, row.try_get("embedding")?));
        }
        Ok(vectors)
    }

    async fn taste_profile(&self, user_id: UserId) -> Result<Option<TasteProfile>> {
        let row = sqlx::query(
            "SELECT user_id::int8 AS user_id, embedding::real[] AS embedding, updated_at
             FROM user_embeddings
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(TasteProfile {
                user_id: row.try_get("user_id")?,
                embedding: row.try_get("embedding")?,
                updated_at: row.try_get("updated_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn upsert_taste_profile(&self, profile: &TasteProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_embeddings (user_id, embedding, updated_at)
             VALUES ($1, $2::real[]::vector, $3)
             ON CONFLICT (user_id)
             DO UPDATE SET embedding = EXCLUDED.embedding, updated_at = EXCLUDED.updated_at",
        )
        .bind(profile.user_id)
        .bind(&profile.embedding)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Upserted taste profile for user {}", profile.user_id);
        Ok(())
    }

    async fn delete_taste_profile(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM user_embeddings WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn nearest_movies(
        &self,
        query: &[f32],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<(MovieId, f64)>> {
        let rows = sqlx::query(
            "SELECT me.movie_id::int8 AS movie_id,
                    (1 - (me.embedding <=> $1::real[]::vector))::float8 AS similarity
             FROM movie_embeddings me
             WHERE NOT (me.movie_id = ANY($2))
             ORDER BY me.embedding <=> $1::real[]::vector, me.movie_id
             LIMIT $3",
        )
        .bind(query)
        .bind(exclusion_list(exclude))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            results.push((row.try_get("movie_id")?, row.try_get("similarity")?));
        }
        Ok(results)
    }

    async fn neighbor_collections(
        &self,
        user_id: UserId,
        query: &[f32],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Result<Vec<CollectionEntry>> {
        let rows = sqlx::query(
            "SELECT um.movie_id::int8 AS movie_id, um.relation_type
             FROM user_embeddings ue
             JOIN user_movies um ON um.user_id = ue.user_id
             WHERE ue.user_id <> $1
               AND NOT (um.movie_id = ANY($3))
             ORDER BY ue.embedding <=> $2::real[]::vector, ue.user_id, um.movie_id, um.relation_type
             LIMIT $4",
        )
        .bind(user_id)
        .bind(query)
        .bind(exclusion_list(exclude))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        entries_from_rows(&rows)
    }
}

#[async_trait]
impl SnapshotStore for PgStore {
    async fn replace_snapshot(&self, user_id: UserId, entries: &[RecommendationEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_recommendations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if !entries.is_empty() {
            let movie_ids: Vec<MovieId> = entries.iter().map(|e| e.movie_id).collect();
            let scores: Vec<f64> = entries.iter().map(|e| e.score).collect();

            sqlx::query(
                "INSERT INTO user_recommendations (user_id, movie_id, score, computed_at)
                 SELECT $1, t.movie_id, t.score, CURRENT_TIMESTAMP
                 FROM UNNEST($2::int8[], $3::float8[]) AS t(movie_id, score)",
            )
            .bind(user_id)
            .bind(&movie_ids)
            .bind(&scores)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn invalidate_snapshot(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM user_recommendations WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn snapshot(&self, user_id: UserId, limit: usize) -> Result<Vec<RecommendationEntry>> {
        let rows = sqlx::query(
            "SELECT movie_id::int8 AS movie_id, score::float8 AS score
             FROM user_recommendations
             WHERE user_id = $1
             ORDER BY score DESC, movie_id
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(RecommendationEntry {
                movie_id: row.try_get("movie_id")?,
                score: row.try_get("score")?,
            });
        }
        Ok(entries)
    }

    async fn has_snapshot(&self, user_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_recommendations WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn user_id_by_email(&self, email: &str) -> Result<Option<UserId>> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "SELECT id::int8 FROM users WHERE email = $1 AND time_deleted IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_list_is_sorted() {
        let exclude: HashSet<MovieId> = [9, 2, 5].into_iter().collect();
        assert_eq!(exclusion_list(&exclude), vec![2, 5, 9]);
    }
}
