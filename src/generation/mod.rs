//! Generation Loop
//!
//! Generate → score against history → accept, or retry with block terms.
//! After `max_attempts` rejections the last candidate goes through the
//! fallback mutator and is accepted as-is; duplicates never fail a run.
//!
//! States: BuildingPrompt → CallingGenerator → Scoring → Accepted
//!         | Retrying → BuildingPrompt | Exhausted → Mutating → Accepted

pub mod mutator;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ai::{build_prompt, TextGenerator};
use crate::config::GenerationConfig;
use crate::dedup::{block_terms, HistoryIndex};
use crate::error::{AutopostError, Result};

pub use mutator::FallbackMutator;

/// Collapse whitespace to single spaces and hard-truncate to `max_chars` characters
pub fn sanitize(text: &str, max_chars: usize) -> String {
    let one_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() > max_chars {
        tracing::warn!("Post text exceeded {} chars; truncating", max_chars);
        return one_line.chars().take(max_chars).collect();
    }
    one_line
}

/// Loop parameters
#[derive(Debug, Clone)]
pub struct LoopParams {
    pub max_attempts: u32,
    pub jaccard_threshold: f64,
    pub hamming_threshold: u32,
    pub max_chars: usize,
    pub block_terms: usize,
    pub prompt_block_terms: usize,
}

impl Default for LoopParams {
    fn default() -> Self {
        LoopParams::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for LoopParams {
    fn from(c: &GenerationConfig) -> Self {
        LoopParams {
            max_attempts: c.max_attempts,
            jaccard_threshold: c.jaccard_threshold,
            hamming_threshold: c.hamming_threshold,
            max_chars: c.max_chars,
            block_terms: c.block_terms,
            prompt_block_terms: c.prompt_block_terms,
        }
    }
}

/// How the final text was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resolution {
    /// A generated candidate passed both thresholds
    Accepted { attempt: u32 },
    /// Every attempt was a duplicate; the last one was mutated
    Mutated,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Accepted { .. } => "accepted",
            Resolution::Mutated => "mutated",
        }
    }
}

/// Scores of one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    pub attempt: u32,
    pub text: String,
    pub jaccard: f64,
    pub hamming: u32,
    pub duplicate: bool,
    pub block_terms: Vec<String>,
}

/// Final text plus what it took to get there
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub resolution: Resolution,
    pub attempts: Vec<AttemptReport>,
}

/// Prompt inputs that stay fixed across attempts
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub base: &'a str,
    pub topic: Option<&'a str>,
}

enum LoopState {
    BuildingPrompt {
        attempt: u32,
        block_terms: Vec<String>,
    },
    CallingGenerator {
        attempt: u32,
        prompt: String,
    },
    Scoring {
        attempt: u32,
        text: String,
    },
    Retrying {
        attempt: u32,
        last: String,
        block_terms: Vec<String>,
    },
    Exhausted {
        last: String,
    },
    Mutating {
        last: String,
    },
    Accepted {
        text: String,
        resolution: Resolution,
    },
}

/// Bounded generate/check/retry search over one generator
pub struct GenerationLoop<'a, G> {
    generator: &'a G,
    params: LoopParams,
    mutator: FallbackMutator,
}

impl<'a, G: TextGenerator> GenerationLoop<'a, G> {
    pub fn new(generator: &'a G, params: LoopParams) -> Self {
        let mutator = FallbackMutator::new(params.max_chars);
        GenerationLoop {
            generator,
            params,
            mutator,
        }
    }

    /// Run the loop. Only generator failures are errors.
    pub async fn run<R: Rng>(
        &self,
        index: &HistoryIndex,
        input: PromptInput<'_>,
        rng: &mut R,
    ) -> Result<GenerationOutcome> {
        let max_attempts = self.params.max_attempts.max(1);
        let mut attempts: Vec<AttemptReport> = Vec::new();
        let mut state = LoopState::BuildingPrompt {
            attempt: 1,
            block_terms: Vec::new(),
        };

        loop {
            state = match state {
                LoopState::BuildingPrompt {
                    attempt,
                    block_terms,
                } => LoopState::CallingGenerator {
                    attempt,
                    prompt: build_prompt(
                        input.base,
                        input.topic,
                        &block_terms,
                        self.params.prompt_block_terms,
                    ),
                },

                LoopState::CallingGenerator { attempt, prompt } => {
                    tracing::debug!("Generating post (attempt {}/{})", attempt, max_attempts);
                    let raw = self.generator.generate(&prompt).await?;
                    let text = sanitize(&raw, self.params.max_chars);
                    if text.is_empty() {
                        return Err(AutopostError::Generator(format!(
                            "{} returned empty text",
                            self.generator.name()
                        )));
                    }
                    LoopState::Scoring { attempt, text }
                }

                LoopState::Scoring { attempt, text } => {
                    let candidate = index.score(&text);
                    let duplicate = candidate
                        .is_duplicate(self.params.jaccard_threshold, self.params.hamming_threshold);

                    tracing::info!(
                        attempt,
                        jaccard = candidate.jaccard_score,
                        hamming = candidate.hamming_distance,
                        duplicate,
                        "Scored candidate against {} history records",
                        index.len()
                    );

                    let terms = if duplicate {
                        candidate
                            .nearest
                            .and_then(|i| index.get(i))
                            .map(|r| {
                                block_terms(
                                    &r.normalized_text,
                                    index.shingle_size(),
                                    self.params.block_terms,
                                )
                            })
                            .unwrap_or_default()
                    } else {
                        Vec::new()
                    };

                    attempts.push(AttemptReport {
                        attempt,
                        text: text.clone(),
                        jaccard: candidate.jaccard_score,
                        hamming: candidate.hamming_distance,
                        duplicate,
                        block_terms: terms.clone(),
                    });

                    if duplicate {
                        LoopState::Retrying {
                            attempt,
                            last: text,
                            block_terms: terms,
                        }
                    } else {
                        LoopState::Accepted {
                            text,
                            resolution: Resolution::Accepted { attempt },
                        }
                    }
                }

                LoopState::Retrying {
                    attempt,
                    last,
                    block_terms,
                } => {
                    if attempt < max_attempts {
                        LoopState::BuildingPrompt {
                            attempt: attempt + 1,
                            block_terms,
                        }
                    } else {
                        LoopState::Exhausted { last }
                    }
                }

                LoopState::Exhausted { last } => {
                    tracing::warn!(
                        "No unique candidate after {} attempts; applying fallback mutation",
                        max_attempts
                    );
                    LoopState::Mutating { last }
                }

                LoopState::Mutating { last } => LoopState::Accepted {
                    text: self.mutator.mutate(&last, rng),
                    resolution: Resolution::Mutated,
                },

                LoopState::Accepted { text, resolution } => {
                    tracing::info!("Post {} ({} chars)", resolution.as_str(), text.chars().count());
                    return Ok(GenerationOutcome {
                        text,
                        resolution,
                        attempts,
                    });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::HistoryRecord;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses, then repeats the fallback text
    struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<String>>>,
        fallback: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn repeating(text: &str) -> Self {
            ScriptedGenerator {
                responses: Mutex::new(VecDeque::new()),
                fallback: text.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn scripted(responses: Vec<Result<String>>, fallback: &str) -> Self {
            ScriptedGenerator {
                responses: Mutex::new(responses.into()),
                fallback: fallback.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn memory_index(texts: &[&str]) -> (tempfile::TempDir, HistoryIndex) {
        let dir = tempfile::tempdir().unwrap();
        let mut index = HistoryIndex::new(dir.path().join("history_index.json"), 2);
        for text in texts {
            index.append(HistoryRecord::from_text(text, 2));
        }
        (dir, index)
    }

    const PROMPT: PromptInput<'static> = PromptInput {
        base: "Write a post.",
        topic: None,
    };

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  a \n\n b\tc  ", 140), "a b c");
        assert_eq!(sanitize("", 140), "");
        assert_eq!(sanitize("abcdef", 3), "abc");
        assert_eq!(sanitize("日本語のテキスト", 3), "日本語");
    }

    #[tokio::test]
    async fn test_empty_history_accepts_first_attempt() {
        let (_dir, index) = memory_index(&[]);
        let generator = ScriptedGenerator::repeating("Anything goes here");
        let gen_loop = GenerationLoop::new(&generator, LoopParams::default());

        let outcome = gen_loop
            .run(&index, PROMPT, &mut StdRng::seed_from_u64(0))
            .await
            .unwrap();
        assert_eq!(outcome.resolution, Resolution::Accepted { attempt: 1 });
        assert_eq!(outcome.text, "Anything goes here");
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_exact_duplicate_exhausts_and_mutates() {
        let (_dir, index) = memory_index(&["ai technology is changing fast"]);
        let generator = ScriptedGenerator::repeating("AI Technology is changing FAST!!");
        let gen_loop = GenerationLoop::new(&generator, LoopParams::default());

        let outcome = gen_loop
            .run(&index, PROMPT, &mut StdRng::seed_from_u64(42))
            .await
            .unwrap();

        assert_eq!(generator.calls(), 5);
        assert_eq!(outcome.resolution, Resolution::Mutated);
        assert_eq!(outcome.attempts.len(), 5);
        for report in &outcome.attempts {
            assert!(report.duplicate);
            assert!((report.jaccard - 1.0).abs() < f64::EPSILON);
            assert_eq!(report.hamming, 0);
        }
        assert_ne!(outcome.text, "AI Technology is changing FAST!!");
        assert!(!outcome.text.is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_duplicate_falls_back_unchanged() {
        let (_dir, index) = memory_index(&["rust compiles"]);
        let generator = ScriptedGenerator::repeating("Rust compiles.");
        let params = LoopParams {
            max_attempts: 2,
            ..LoopParams::default()
        };
        let gen_loop = GenerationLoop::new(&generator, params);

        let outcome = gen_loop
            .run(&index, PROMPT, &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();
        assert_eq!(outcome.resolution, Resolution::Mutated);
        assert_eq!(outcome.text, "Rust compiles.");
    }

    #[tokio::test]
    async fn test_high_jaccard_runs_exactly_max_attempts() {
        // 9 of the 10 stored bigrams: Jaccard 0.9 on every attempt
        let (_dir, index) = memory_index(&["abcdefghijk"]);
        let generator = ScriptedGenerator::repeating("abcdefghij");
        let params = LoopParams {
            max_attempts: 3,
            ..LoopParams::default()
        };
        let gen_loop = GenerationLoop::new(&generator, params);

        let outcome = gen_loop
            .run(&index, PROMPT, &mut StdRng::seed_from_u64(3))
            .await
            .unwrap();

        assert_eq!(generator.calls(), 3);
        assert_eq!(outcome.attempts.len(), 3);
        for report in &outcome.attempts {
            assert!((report.jaccard - 0.9).abs() < 1e-12);
        }
        assert_eq!(outcome.resolution, Resolution::Mutated);
        assert!(!outcome.text.is_empty());
    }

    #[tokio::test]
    async fn test_retry_prompt_carries_block_terms() {
        let (_dir, index) = memory_index(&["ai technology is changing fast"]);
        let generator = ScriptedGenerator::scripted(
            vec![Ok("AI technology is changing fast".to_string())],
            "Octopuses have three hearts and blue blood",
        );
        let gen_loop = GenerationLoop::new(&generator, LoopParams::default());

        let outcome = gen_loop
            .run(&index, PROMPT, &mut StdRng::seed_from_u64(0))
            .await
            .unwrap();

        assert_eq!(outcome.resolution, Resolution::Accepted { attempt: 2 });
        assert_eq!(outcome.text, "Octopuses have three hearts and blue blood");

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], "Write a post.");
        assert!(prompts[1].contains("Avoid content overlapping with these strings"));
        assert!(prompts[1].contains("\"ch\""));
        assert_eq!(outcome.attempts[0].block_terms.len(), 8);
        assert!(outcome.attempts[1].block_terms.is_empty());
    }

    #[tokio::test]
    async fn test_generator_error_is_terminal() {
        let (_dir, index) = memory_index(&[]);
        let generator = ScriptedGenerator::scripted(
            vec![Err(AutopostError::Generator("boom".to_string()))],
            "never used",
        );
        let gen_loop = GenerationLoop::new(&generator, LoopParams::default());

        let err = gen_loop
            .run(&index, PROMPT, &mut StdRng::seed_from_u64(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AutopostError::Generator(_)));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_generation_is_error() {
        let (_dir, index) = memory_index(&[]);
        let generator = ScriptedGenerator::repeating("   \n ");
        let gen_loop = GenerationLoop::new(&generator, LoopParams::default());

        let err = gen_loop
            .run(&index, PROMPT, &mut StdRng::seed_from_u64(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AutopostError::Generator(_)));
    }

    #[tokio::test]
    async fn test_long_output_is_truncated() {
        let (_dir, index) = memory_index(&[]);
        let generator = ScriptedGenerator::repeating(&"x".repeat(300));
        let gen_loop = GenerationLoop::new(&generator, LoopParams::default());

        let outcome = gen_loop
            .run(&index, PROMPT, &mut StdRng::seed_from_u64(0))
            .await
            .unwrap();
        assert_eq!(outcome.text.chars().count(), 140);
    }
}
