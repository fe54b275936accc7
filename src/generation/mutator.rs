//! Fallback mutation for candidates the loop could not make unique
//!
//! A literal perturbation, not a rewrite: one or two table substitutions
//! picked at random among the entries that match, then re-sanitized.

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use super::sanitize;

/// (pattern, replacement). Patterns are case-insensitive.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    (r"\bvery\b", "really"),
    (r"\bimportant\b", "key"),
    (r"\bamazing\b", "remarkable"),
    (r"\bfast\b", "quickly"),
    (r"\bchanging\b", "evolving"),
    (r"\btechnology\b", "tech"),
    (r"\bpeople\b", "folks"),
    (r"\bnew\b", "fresh"),
    (r"\bbig\b", "major"),
    (r"\bin fact\b", "actually"),
    (r"\bdid you know\b", "fun fact:"),
    ("とても", "すごく"),
    ("重要", "大切"),
    ("実は", "じつは"),
    ("知ってた？", "ご存じですか？"),
    ("驚き", "びっくり"),
    ("最新", "最先端"),
];

/// Applies a small fixed substitution table
pub struct FallbackMutator {
    table: Vec<(Regex, &'static str)>,
    max_chars: usize,
}

impl FallbackMutator {
    pub fn new(max_chars: usize) -> Self {
        let table = SUBSTITUTIONS
            .iter()
            .map(|(pattern, replacement)| {
                (
                    Regex::new(&format!("(?i){}", pattern)).unwrap(),
                    *replacement,
                )
            })
            .collect();
        FallbackMutator { table, max_chars }
    }

    /// Apply 1–2 randomly chosen matching substitutions, then re-sanitize.
    /// Text no entry matches is only re-sanitized.
    pub fn mutate<R: Rng>(&self, text: &str, rng: &mut R) -> String {
        let matching: Vec<&(Regex, &'static str)> = self
            .table
            .iter()
            .filter(|(re, _)| re.is_match(text))
            .collect();

        if matching.is_empty() {
            tracing::debug!("No fallback substitution matches; leaving text unchanged");
            return sanitize(text, self.max_chars);
        }

        let count = rng.gen_range(1..=2).min(matching.len());
        let mut mutated = text.to_string();
        for (re, replacement) in matching.choose_multiple(rng, count) {
            mutated = re.replace_all(&mutated, *replacement).into_owned();
            tracing::debug!("Fallback substitution {} -> {}", re.as_str(), replacement);
        }

        sanitize(&mutated, self.max_chars)
    }
}
