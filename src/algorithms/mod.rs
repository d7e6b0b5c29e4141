pub mod candidates;
pub mod genre;
pub mod retriever;
pub mod scorer;
pub mod selector;

pub use candidates::{Candidate, CandidateStore};
pub use genre::GenreWeights;
pub use scorer::{score_candidates, ScoreBreakdown};
pub use selector::select_top_k;
