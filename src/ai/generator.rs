//! Text generator collaborator
//!
//! The generation loop only needs "prompt in, text out". Backends implement
//! `TextGenerator`; the CLI backend is chosen once per run from configuration.

use std::time::Duration;

use super::cli::{detect_provider, run_cli, select_provider, CliProvider, DetectedCli};
use crate::config::AiConfig;
use crate::error::{AutopostError, Result};

/// Produces post text from a prompt. Failures end the run; no retries here.
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Backend name recorded in the payload
    fn name(&self) -> &str;

    /// Model override, if any
    fn model(&self) -> Option<&str> {
        None
    }
}

/// Generator backed by an installed AI CLI
#[derive(Debug, Clone)]
pub struct CliGenerator {
    cli: DetectedCli,
    model: Option<String>,
    timeout: Duration,
}

impl CliGenerator {
    pub fn new(cli: DetectedCli, model: Option<String>, timeout: Duration) -> Self {
        CliGenerator {
            cli,
            model,
            timeout,
        }
    }

    /// Select the provider from config and locate its binary.
    pub async fn from_config(config: &AiConfig) -> Result<Self> {
        let provider = select_provider(&config.provider)?;
        let cli = detect_provider(provider).await;

        if !cli.installed {
            return Err(AutopostError::Config(format!(
                "{} CLI not installed",
                provider.display_name()
            )));
        }

        tracing::info!(
            "Using {} CLI {} at {}",
            provider.display_name(),
            cli.version.as_deref().unwrap_or("(unknown version)"),
            cli.path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );

        let timeout = config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| provider.generation_timeout());

        Ok(CliGenerator::new(cli, config.model.clone(), timeout))
    }

    pub fn provider(&self) -> CliProvider {
        self.cli.provider
    }
}

impl TextGenerator for CliGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        run_cli(&self.cli, prompt, self.model.as_deref(), self.timeout).await
    }

    fn name(&self) -> &str {
        self.cli.provider.config_str()
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}
