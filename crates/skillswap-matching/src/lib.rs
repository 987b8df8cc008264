//! Peer-matching over skill/need overlap.
//!
//! Everything in this crate is a pure function over in-memory profiles:
//! scoring two profiles is symmetric, ranking a candidate pool never
//! touches the store, and per-candidate scores are independent of each
//! other (callers may parallelise if pools ever grow beyond the
//! low-hundreds they are today).

pub mod finder;
pub mod score;

pub use finder::{ScoredCandidate, find_matches, topic_recommendations};
pub use score::compatibility_score;
