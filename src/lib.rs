//! Autopost - generate short social posts with an LLM CLI and avoid repeating yourself
//!
//! This crate provides:
//! - Text normalization, character shingles, Jaccard + SimHash similarity
//! - A persisted history index with preview-log recovery and reconciliation
//! - A bounded generate/check/retry loop with a fallback mutator
//! - CLI-backed text generation and command-backed posting
//!
//! # Usage
//!
//! As a library:
//! ```ignore
//! use autopost::{Autopost, Config};
//! use autopost::ai::CliGenerator;
//! use autopost::poster::PosterBackend;
//!
//! let config = Config::from_file("~/.autopost/config.toml")?;
//! let generator = CliGenerator::from_config(&config.ai).await?;
//! let poster = PosterBackend::from_config(&config.poster)?;
//! let mut app = Autopost::new(config)?;
//! let report = app.run(&generator, &poster).await?;
//! ```
//!
//! As a CLI:
//! ```text
//! autopost --config ~/.autopost/config.toml --dry-run
//! ```

pub mod ai;
pub mod config;
pub mod dedup;
pub mod error;
pub mod generation;
pub mod poster;
pub mod preview;

// Re-export main types for convenience
pub use config::Config;
pub use dedup::HistoryIndex;
pub use error::{AutopostError, Result};
pub use generation::{GenerationOutcome, Resolution};

use ai::TextGenerator;
use dedup::HistoryRecord;
use generation::{GenerationLoop, LoopParams, PromptInput};
use poster::{PostReceipt, Poster};
use preview::{save_payload, Payload, PostResult, PreviewEntry, PreviewLog};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// What one run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: GenerationOutcome,
    pub receipt: PostReceipt,
    /// Whether the text was added to the history index
    pub recorded: bool,
}

/// One generate-and-post cycle over a history index
pub struct Autopost {
    /// Configuration
    pub config: Config,

    index: HistoryIndex,
    preview: PreviewLog,
    rng: StdRng,
}

impl Autopost {
    /// Open the data directory and the history index (rebuilding and
    /// reconciling it against the preview log as needed)
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(config.data_dir())?;

        let preview = PreviewLog::new(config.preview_log_path());
        let index = HistoryIndex::open(
            config.index_path(),
            &preview,
            config.generation.shingle_size,
        )?;
        tracing::info!("History index ready with {} records", index.len());

        let rng = match config.generation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Autopost {
            config,
            index,
            preview,
            rng,
        })
    }

    pub fn index(&self) -> &HistoryIndex {
        &self.index
    }

    pub fn preview_log(&self) -> &PreviewLog {
        &self.preview
    }

    /// Discard the durable index and rebuild it from the preview log.
    /// Returns the number of records.
    pub fn rebuild_index(&mut self) -> Result<usize> {
        let records = self.index.rebuild_from_log(&self.preview)?;
        Ok(records.len())
    }

    /// Generate, post, then record.
    ///
    /// History is updated only after the poster reports success and never for
    /// dry runs. Generator and poster failures are returned as errors.
    pub async fn run<G, P>(&mut self, generator: &G, poster: &P) -> Result<RunReport>
    where
        G: TextGenerator,
        P: Poster,
    {
        let params = LoopParams::from(&self.config.generation);
        let input = PromptInput {
            base: &self.config.prompt.base,
            topic: self.config.prompt.topic.as_deref(),
        };

        let outcome = GenerationLoop::new(generator, params)
            .run(&self.index, input, &mut self.rng)
            .await?;
        let generated_at = chrono::Utc::now().to_rfc3339();

        let receipt = match poster.post(&outcome.text).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!("Post failed: {}", e);
                let result = PostResult {
                    success: false,
                    dry_run: false,
                    post_id: None,
                    url: None,
                    posted_at: None,
                    error: Some(e.to_string()),
                };
                self.write_payload(generator, &outcome, &generated_at, result);
                return Err(e);
            }
        };

        let recorded = !receipt.dry_run;
        if recorded {
            self.index.append(HistoryRecord::from_text(
                &outcome.text,
                self.index.shingle_size(),
            ));
        }

        let mut entry = PreviewEntry::new(outcome.text.clone())
            .with_meta("provider", generator.name())
            .with_meta("resolution", outcome.resolution.as_str())
            .with_meta("attempts", outcome.attempts.len().to_string())
            .with_url(receipt.url.clone())
            .dry_run(receipt.dry_run);
        if let Some(model) = generator.model() {
            entry = entry.with_meta("model", model);
        }
        if let Some(topic) = &self.config.prompt.topic {
            entry = entry.with_meta("topic", topic.as_str());
        }
        if let Err(e) = self.preview.append(&entry) {
            tracing::warn!(
                "Failed to append preview log {}: {}",
                self.preview.path().display(),
                e
            );
        }

        let result = PostResult {
            success: true,
            dry_run: receipt.dry_run,
            post_id: Some(receipt.post_id.clone()),
            url: receipt.url.clone(),
            posted_at: Some(chrono::Utc::now().to_rfc3339()),
            error: None,
        };
        self.write_payload(generator, &outcome, &generated_at, result);

        Ok(RunReport {
            outcome,
            receipt,
            recorded,
        })
    }

    fn write_payload<G: TextGenerator>(
        &self,
        generator: &G,
        outcome: &GenerationOutcome,
        generated_at: &str,
        result: PostResult,
    ) {
        let payload = Payload {
            text: outcome.text.clone(),
            generated_at: generated_at.to_string(),
            provider: generator.name().to_string(),
            model: generator.model().map(str::to_string),
            topic: self.config.prompt.topic.clone(),
            resolution: outcome.resolution.as_str().to_string(),
            attempts: outcome.attempts.len() as u32,
            result,
        };
        let path = self.config.payload_path();
        if let Err(e) = save_payload(&path, &payload) {
            tracing::warn!("Failed to write payload {}: {}", path.display(), e);
        }
    }
}
