//! Character shingles (n-grams) over normalized text
//!
//! Spaces are dropped before windowing so scripts without word boundaries
//! (Japanese, Chinese) compare by character adjacency like everything else.

use std::collections::{HashMap, HashSet};

/// Default shingle length
pub const DEFAULT_SHINGLE_SIZE: usize = 2;

fn compact_chars(normalized: &str) -> Vec<char> {
    normalized.chars().filter(|&c| c != ' ').collect()
}

/// Set of length-`n` character shingles of already-normalized text.
///
/// Text shorter than `n` yields itself as the only shingle, or nothing when empty.
pub fn shingles(normalized: &str, n: usize) -> HashSet<String> {
    let chars = compact_chars(normalized);
    let n = n.max(1);

    if chars.len() < n {
        let mut set = HashSet::new();
        if !chars.is_empty() {
            set.insert(chars.iter().collect());
        }
        return set;
    }

    chars.windows(n).map(|w| w.iter().collect()).collect()
}

/// Shingles ordered by occurrence count (descending), first occurrence breaking ties.
pub fn shingle_frequencies(normalized: &str, n: usize) -> Vec<(String, usize)> {
    let chars = compact_chars(normalized);
    let n = n.max(1);

    if chars.len() < n {
        return if chars.is_empty() {
            Vec::new()
        } else {
            vec![(chars.iter().collect(), 1)]
        };
    }

    // (count, first position) per shingle
    let mut stats: HashMap<String, (usize, usize)> = HashMap::new();
    for (pos, window) in chars.windows(n).enumerate() {
        let entry = stats.entry(window.iter().collect()).or_insert((0, pos));
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = stats
        .into_iter()
        .map(|(s, (count, first))| (s, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().map(|(s, count, _)| (s, count)).collect()
}

/// Top-`k` most frequent shingles, used as negative guidance for the next prompt.
pub fn block_terms(normalized: &str, n: usize, k: usize) -> Vec<String> {
    shingle_frequencies(normalized, n)
        .into_iter()
        .take(k)
        .map(|(s, _)| s)
        .collect()
}
