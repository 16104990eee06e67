//! Pure plate logic: image preparation, format validation and ranking.

pub mod normalize;
pub mod ranker;
pub mod validator;

pub use normalize::normalize;
pub use ranker::{rank, Candidate, RankOutcome, MIN_CANDIDATE_CONFIDENCE};
pub use validator::validate;
