use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type MovieId = i64;
pub type GenreId = i32;

/// Which list of a user's collection a movie sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Favorite,
    Watchlist,
}

impl RelationType {
    /// Weight a neighbour's entry adds to a movie's collaborative score.
    pub fn collaborative_weight(&self) -> f64 {
        match self {
            RelationType::Favorite => 1.0,
            RelationType::Watchlist => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Favorite => "favorite",
            RelationType::Watchlist => "watchlist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "favorite" => Some(RelationType::Favorite),
            "watchlist" => Some(RelationType::Watchlist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub movie_id: MovieId,
    pub relation: RelationType,
}

impl CollectionEntry {
    pub fn favorite(movie_id: MovieId) -> Self {
        Self { movie_id, relation: RelationType::Favorite }
    }

    pub fn watchlist(movie_id: MovieId) -> Self {
        Self { movie_id, relation: RelationType::Watchlist }
    }
}

/// Base catalog attributes the scorer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieMetadata {
    pub movie_id: MovieId,
    pub score: Option<f64>,
    pub popularity: Option<f64>,
    pub genre_ids: Vec<GenreId>,
}

/// Catalog row returned to readers of the recommendation snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: MovieId,
    pub tmdb_id: i64,
    pub title: String,
    pub tagline: Option<String>,
    pub release_year: i32,
    pub overview: Option<String>,
    pub score: Option<f64>,
    pub popularity: Option<f64>,
    pub language: Option<String>,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
}

impl MovieSummary {
    pub fn new(id: MovieId, title: impl Into<String>, release_year: i32) -> Self {
        Self {
            id,
            tmdb_id: 0,
            title: title.into(),
            tagline: None,
            release_year,
            overview: None,
            score: None,
            popularity: None,
            language: None,
            poster_url: None,
            trailer_url: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = Some(popularity);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub user_id: UserId,
    pub embedding: Vec<f32>,
    pub updated_at: DateTime<Utc>,
}

impl TasteProfile {
    pub fn new(user_id: UserId, embedding: Vec<f32>) -> Self {
        Self {
            user_id,
            embedding,
            updated_at: Utc::now(),
        }
    }
}

/// One persisted row of a user's recommendation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub movie_id: MovieId,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSnapshot {
    pub user_id: UserId,
    pub entries: Vec<RecommendationEntry>,
    pub computed_at: DateTime<Utc>,
}

/// Outcome of one ComputeRecommendations run, mostly for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeSummary {
    pub candidate_count: usize,
    pub persisted: usize,
    pub used_taste_profile: bool,
}
