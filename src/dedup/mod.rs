//! Duplicate Detection
//!
//! Keeps generated posts from repeating earlier ones:
//! - Normalization (case, punctuation, whitespace)
//! - Character shingles, language-agnostic (CJK included)
//! - Jaccard overlap + 64-bit SimHash / Hamming distance
//! - A persisted history index queried by full scan

pub mod index;
pub mod normalize;
pub mod shingle;
pub mod similarity;

pub use index::{Candidate, HistoryIndex, HistoryRecord};
pub use normalize::normalize;
pub use shingle::{block_terms, shingles, DEFAULT_SHINGLE_SIZE};
pub use similarity::{fingerprint, hamming, jaccard, nearest, simhash, Neighbor};
