use super::candidates::Candidate;
use crate::models::RecommendationEntry;
use std::cmp::Ordering;

/// Highest final score first; equal scores fall back to ascending movie id.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| a.movie_id.cmp(&b.movie_id))
}

pub fn select_top_k(mut candidates: Vec<Candidate>, k: usize) -> Vec<RecommendationEntry> {
    candidates.sort_by(rank_order);
    candidates.truncate(k);
    candidates
        .into_iter()
        .map(|c| RecommendationEntry {
            movie_id: c.movie_id,
            score: c.final_score,
        })
        .collect()
}
