//! Similarity signals between texts
//!
//! Two independent signals over shingle sets:
//! - Jaccard overlap of the sets
//! - Hamming distance between 64-bit SimHash fingerprints
//!
//! Fingerprints are persisted, so shingle hashing uses xxh3 with a fixed seed
//! and stays identical across processes and releases.

use std::collections::HashSet;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use super::index::HistoryRecord;
use super::shingle::shingles;

/// Seed for shingle hashing. Changing it invalidates every stored fingerprint.
pub const SIMHASH_SEED: u64 = 0x5eed_a070_0057_0001;

/// Number of fingerprint bits
pub const FINGERPRINT_BITS: u32 = 64;

/// Jaccard similarity: |A ∩ B| / |A ∪ B|.
///
/// 0.0 when either set is empty or nothing is shared.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    if intersection == 0 {
        return 0.0;
    }
    let union = a.len() + b.len() - intersection;

    intersection as f64 / union as f64
}

/// Stable 64-bit hash of one shingle
pub fn shingle_hash(shingle: &str) -> u64 {
    xxh3_64_with_seed(shingle.as_bytes(), SIMHASH_SEED)
}

/// SimHash over weighted features.
///
/// Each feature adds its weight to every bit position set in its hash and
/// subtracts it elsewhere; output bit `i` is 1 when position `i` ends at or above zero.
pub fn simhash<'a, I>(features: I) -> u64
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut acc = [0i64; FINGERPRINT_BITS as usize];

    for (feature, weight) in features {
        let h = shingle_hash(feature);
        for (bit, slot) in acc.iter_mut().enumerate() {
            if (h >> bit) & 1 == 1 {
                *slot += weight;
            } else {
                *slot -= weight;
            }
        }
    }

    let mut out = 0u64;
    for (bit, value) in acc.iter().enumerate() {
        if *value >= 0 {
            out |= 1u64 << bit;
        }
    }
    out
}

/// SimHash of a shingle set, every shingle weighted 1
pub fn fingerprint_shingles(set: &HashSet<String>) -> u64 {
    simhash(set.iter().map(|s| (s.as_str(), 1)))
}

/// Fingerprint of already-normalized text
pub fn fingerprint(normalized: &str, n: usize) -> u64 {
    fingerprint_shingles(&shingles(normalized, n))
}

/// Number of differing bits, 0..=64
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Closest history record to a candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Position of the record in the index, `None` when nothing beat the initial state
    pub index: Option<usize>,
    pub jaccard: f64,
    pub hamming: u32,
}

impl Default for Neighbor {
    fn default() -> Self {
        Neighbor {
            index: None,
            jaccard: 0.0,
            hamming: FINGERPRINT_BITS,
        }
    }
}

/// Full scan for the record maximizing Jaccard, ties broken by smaller Hamming distance.
///
/// Strict comparisons keep the earliest record on exact ties.
pub fn nearest(
    candidate: &HashSet<String>,
    candidate_fp: u64,
    records: &[HistoryRecord],
    n: usize,
) -> Neighbor {
    let mut best = Neighbor::default();

    for (i, record) in records.iter().enumerate() {
        let score = jaccard(candidate, &shingles(&record.normalized_text, n));
        let distance = hamming(candidate_fp, record.fingerprint);

        if score > best.jaccard || (score == best.jaccard && distance < best.hamming) {
            best = Neighbor {
                index: Some(i),
                jaccard: score,
                hamming: distance,
            };
        }
    }

    best
}
