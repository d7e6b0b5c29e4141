use super::candidates::{Candidate, CandidateStore};
use super::genre::GenreWeights;

pub const GENRE_AFFINITY_WEIGHT: f64 = 0.35;
pub const EMBEDDING_WEIGHT: f64 = 0.25;
pub const COLLABORATIVE_WEIGHT: f64 = 0.20;
pub const CATALOG_SCORE_WEIGHT: f64 = 0.12;
pub const POPULARITY_WEIGHT: f64 = 0.08;

const MAX_CATALOG_SCORE: f64 = 10.0;
const POPULARITY_CAP: f64 = 100.0;

/// Normalized inputs of one candidate's blended score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub genre_affinity: f64,
    pub embedding: f64,
    pub collaborative: f64,
    pub catalog_score: f64,
    pub popularity: f64,
}

impl ScoreBreakdown {
    pub fn of(candidate: &Candidate, max_collaborative: f64) -> Self {
        let collaborative = if max_collaborative > 0.0 {
            candidate.collaborative_score / max_collaborative
        } else {
            0.0
        };

        Self {
            genre_affinity: candidate.genre_affinity,
            embedding: candidate.embedding_similarity.max(0.0),
            collaborative,
            catalog_score: candidate.score.unwrap_or(0.0) / MAX_CATALOG_SCORE,
            popularity: candidate.popularity.unwrap_or(0.0).min(POPULARITY_CAP) / POPULARITY_CAP,
        }
    }

    pub fn blend(&self) -> f64 {
        self.genre_affinity * GENRE_AFFINITY_WEIGHT
            + self.embedding * EMBEDDING_WEIGHT
            + self.collaborative * COLLABORATIVE_WEIGHT
            + self.catalog_score * CATALOG_SCORE_WEIGHT
            + self.popularity * POPULARITY_WEIGHT
    }
}

/// Largest collaborative weight in the current run.
pub fn max_collaborative(store: &CandidateStore) -> f64 {
    store
        .iter()
        .map(|c| c.collaborative_score)
        .fold(0.0, f64::max)
}

/// Assign genre affinity and the final blended score to every candidate.
/// Collaborative normalization uses this run's maximum only.
pub fn score_candidates(store: &mut CandidateStore, genre_weights: &GenreWeights) {
    for candidate in store.iter_mut() {
        candidate.genre_affinity = genre_weights.affinity(&candidate.genre_ids);
    }

    let max_collab = max_collaborative(store);
    for candidate in store.iter_mut() {
        candidate.final_score = ScoreBreakdown::of(candidate, max_collab).blend();
    }
}
