//! Poster collaborator
//!
//! Publishing is delegated to an external command; dry-run mode never calls out.
//! Uses enum dispatch to pick the backend without trait objects.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::PosterConfig;
use crate::error::{AutopostError, Result};

/// Time allowed for the external posting command
const POST_TIMEOUT: Duration = Duration::from_secs(60);

/// Successful publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub post_id: String,
    pub url: Option<String>,
    /// Nothing was published
    pub dry_run: bool,
}

/// Publishes final text
#[allow(async_fn_in_trait)]
pub trait Poster {
    async fn post(&self, text: &str) -> Result<PostReceipt>;
}

/// Logs instead of publishing
#[derive(Debug, Clone, Default)]
pub struct DryRunPoster;

impl Poster for DryRunPoster {
    async fn post(&self, text: &str) -> Result<PostReceipt> {
        tracing::info!("DRY RUN: would post: {}", text);
        Ok(PostReceipt {
            post_id: format!("dry-run-{}", uuid::Uuid::new_v4()),
            url: None,
            dry_run: true,
        })
    }
}

/// Runs an external command with the text as its last argument.
/// The first non-empty stdout line is the post id.
#[derive(Debug, Clone)]
pub struct CommandPoster {
    command: PathBuf,
    args: Vec<String>,
    url_template: Option<String>,
}

impl CommandPoster {
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>, url_template: Option<String>) -> Self {
        CommandPoster {
            command: command.into(),
            args,
            url_template,
        }
    }

    fn url_for(&self, post_id: &str) -> Option<String> {
        self.url_template
            .as_ref()
            .map(|t| t.replace("{id}", post_id))
    }
}

impl Poster for CommandPoster {
    async fn post(&self, text: &str) -> Result<PostReceipt> {
        tracing::debug!("Running poster command {}", self.command.display());

        let result = timeout(POST_TIMEOUT, async {
            Command::new(&self.command)
                .args(&self.args)
                .arg(text)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
        })
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(AutopostError::Poster(format!(
                    "Failed to execute {}: {}",
                    self.command.display(),
                    e
                )))
            }
            Err(_) => {
                return Err(AutopostError::Poster(format!(
                    "Poster timed out after {} seconds",
                    POST_TIMEOUT.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutopostError::Poster(format!(
                "Poster command failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let post_id = stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| AutopostError::Poster("No post id returned".to_string()))?
            .to_string();

        let url = self.url_for(&post_id);
        tracing::info!("Post published: {}", url.as_deref().unwrap_or(&post_id));

        Ok(PostReceipt {
            post_id,
            url,
            dry_run: false,
        })
    }
}

/// Poster chosen once per run from configuration
#[derive(Debug, Clone)]
pub enum PosterBackend {
    DryRun(DryRunPoster),
    Command(CommandPoster),
}

impl PosterBackend {
    pub fn from_config(config: &PosterConfig) -> Result<Self> {
        if config.dry_run {
            return Ok(PosterBackend::DryRun(DryRunPoster));
        }
        let command = config.command.as_ref().ok_or_else(|| {
            AutopostError::Config("poster.command is required unless dry_run is set".to_string())
        })?;
        Ok(PosterBackend::Command(CommandPoster::new(
            command,
            config.args.clone(),
            config.url_template.clone(),
        )))
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, PosterBackend::DryRun(_))
    }
}

impl Poster for PosterBackend {
    async fn post(&self, text: &str) -> Result<PostReceipt> {
        match self {
            PosterBackend::DryRun(p) => p.post(text).await,
            PosterBackend::Command(p) => p.post(text).await,
        }
    }
}
