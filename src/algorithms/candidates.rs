use crate::models::{GenreId, MovieId, MovieMetadata};
use std::collections::HashMap;

/// A movie under consideration during one recommendation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub movie_id: MovieId,
    pub score: Option<f64>,
    pub popularity: Option<f64>,
    pub genre_ids: Vec<GenreId>,
    /// Cosine similarity to the user's taste vector, in [-1, 1].
    pub embedding_similarity: f64,
    pub collaborative_score: f64,
    pub genre_affinity: f64,
    pub final_score: f64,
    has_metadata: bool,
}

impl Candidate {
    pub fn new(movie_id: MovieId) -> Self {
        Self {
            movie_id,
            ..Default::default()
        }
    }

    pub fn has_metadata(&self) -> bool {
        self.has_metadata
    }

    pub fn apply_metadata(&mut self, metadata: &MovieMetadata) {
        if metadata.score.is_some() {
            self.score = metadata.score;
        }
        if metadata.popularity.is_some() {
            self.popularity = metadata.popularity;
        }
        self.genre_ids = metadata.genre_ids.clone();
        self.has_metadata = true;
    }
}

/// Keyed accumulator of candidates for a single run. Collectors merge into
/// existing records, so each movie appears at most once.
#[derive(Debug, Default)]
pub struct CandidateStore {
    candidates: HashMap<MovieId, Candidate>,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, movie_id: MovieId) -> &mut Candidate {
        self.candidates
            .entry(movie_id)
            .or_insert_with(|| Candidate::new(movie_id))
    }

    pub fn record_similarity(&mut self, movie_id: MovieId, similarity: f64) {
        let candidate = self.entry(movie_id);
        candidate.embedding_similarity = similarity;
    }

    pub fn add_collaborative(&mut self, movie_id: MovieId, weight: f64) {
        self.entry(movie_id).collaborative_score += weight;
    }

    pub fn merge_metadata(&mut self, metadata: &MovieMetadata) {
        self.entry(metadata.movie_id).apply_metadata(metadata);
    }

    /// Fill metadata only for movies already tracked.
    pub fn enrich(&mut self, metadata: &MovieMetadata) -> bool {
        match self.candidates.get_mut(&metadata.movie_id) {
            Some(candidate) => {
                candidate.apply_metadata(metadata);
                true
            }
            None => false,
        }
    }

    /// Ids of candidates nobody has supplied catalog attributes for, sorted.
    pub fn missing_metadata(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self
            .candidates
            .values()
            .filter(|c| !c.has_metadata)
            .map(|c| c.movie_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn get(&self, movie_id: MovieId) -> Option<&Candidate> {
        self.candidates.get(&movie_id)
    }

    pub fn contains(&self, movie_id: MovieId) -> bool {
        self.candidates.contains_key(&movie_id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Candidate> {
        self.candidates.values_mut()
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(movie_id: MovieId, genres: Vec<GenreId>) -> MovieMetadata {
        MovieMetadata {
            movie_id,
            score: Some(7.5),
            popularity: Some(42.0),
            genre_ids: genres,
        }
    }

    #[test]
    fn test_sources_merge_into_one_record() {
        let mut store = CandidateStore::new();
        store.record_similarity(1, 0.8);
        store.add_collaborative(1, 1.0);
        store.add_collaborative(1, 0.5);
        store.merge_metadata(&metadata(1, vec![28]));

        assert_eq!(store.len(), 1);
        let c = store.get(1).unwrap();
        assert_eq!(c.embedding_similarity, 0.8);
        assert_eq!(c.collaborative_score, 1.5);
        assert_eq!(c.score, Some(7.5));
        assert_eq!(c.genre_ids, vec![28]);
        assert!(c.has_metadata());
    }

    #[test]
    fn test_missing_metadata_lists_unenriched() {
        let mut store = CandidateStore::new();
        store.add_collaborative(9, 1.0);
        store.record_similarity(3, 0.1);
        store.merge_metadata(&metadata(5, vec![18]));

        assert_eq!(store.missing_metadata(), vec![3, 9]);

        assert!(store.enrich(&metadata(3, vec![])));
        assert!(!store.enrich(&metadata(77, vec![])));
        assert_eq!(store.missing_metadata(), vec![9]);
        assert!(!store.contains(77));
    }

    #[test]
    fn test_absent_metadata_fields_do_not_overwrite() {
        let mut candidate = Candidate::new(1);
        candidate.apply_metadata(&metadata(1, vec![12]));
        candidate.apply_metadata(&MovieMetadata {
            movie_id: 1,
            score: None,
            popularity: None,
            genre_ids: vec![12, 14],
        });
        assert_eq!(candidate.score, Some(7.5));
        assert_eq!(candidate.popularity, Some(42.0));
        assert_eq!(candidate.genre_ids, vec![12, 14]);
    }
}
