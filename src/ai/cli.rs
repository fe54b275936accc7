//! AI CLI backends
//!
//! Finds an installed AI CLI and runs it in print mode to get post text.
//! Everything that differs between providers lives on `CliProvider`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{AutopostError, Result};

/// Limit for `--version` and PATH lookups
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// AI CLIs that can write posts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliProvider {
    ClaudeCode,
    OpenClaw,
}

impl CliProvider {
    pub const ALL: [CliProvider; 2] = [CliProvider::ClaudeCode, CliProvider::OpenClaw];

    /// Provider for a `[ai] provider` value
    pub fn from_config_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.config_str() == s)
    }

    /// Config string for the provider
    pub fn config_str(&self) -> &'static str {
        match self {
            CliProvider::ClaudeCode => "claude_code",
            CliProvider::OpenClaw => "openclaw",
        }
    }

    /// Display name for the provider
    pub fn display_name(&self) -> &'static str {
        match self {
            CliProvider::ClaudeCode => "Claude Code",
            CliProvider::OpenClaw => "OpenClaw",
        }
    }

    /// Command name to execute
    pub fn command_name(&self) -> &'static str {
        match self {
            CliProvider::ClaudeCode => "claude",
            CliProvider::OpenClaw => "openclaw",
        }
    }

    /// Timeout for one post generation
    pub fn generation_timeout(&self) -> Duration {
        match self {
            CliProvider::ClaudeCode => Duration::from_secs(60),
            CliProvider::OpenClaw => Duration::from_secs(90),
        }
    }

    /// Build CLI arguments for text output
    pub fn build_args(&self, prompt: &str, model: Option<&str>) -> Vec<String> {
        match self {
            CliProvider::ClaudeCode => vec![
                "-p".to_string(),
                prompt.to_string(),
                "--output-format".to_string(),
                "text".to_string(),
                "--model".to_string(),
                model.unwrap_or("sonnet").to_string(),
                // Prevent macOS permission dialogs
                "--strict-mcp-config".to_string(),
                "--disable-slash-commands".to_string(),
                // Print mode: don't create session files
                "--print".to_string(),
            ],
            CliProvider::OpenClaw => {
                let mut args = vec![
                    "agent".to_string(),
                    "--message".to_string(),
                    prompt.to_string(),
                ];
                if let Some(model) = model {
                    args.push("--model".to_string());
                    args.push(model.to_string());
                }
                args
            }
        }
    }

    /// Common installation paths for this provider's CLI binary
    pub fn common_paths(&self) -> Vec<PathBuf> {
        let command = self.command_name();
        let mut paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            // npm global installs
            paths.push(home.join(".npm-global/bin").join(command));
            // Direct installs
            paths.push(home.join(format!(".{}/bin", command)).join(command));
            paths.push(home.join(".local/bin").join(command));
        }

        // System paths
        paths.push(PathBuf::from("/usr/local/bin").join(command));
        paths.push(PathBuf::from("/opt/homebrew/bin").join(command));

        #[cfg(target_os = "windows")]
        {
            if let Some(appdata) = dirs::data_local_dir() {
                paths.push(appdata.join(format!("Programs/{0}/{0}.exe", command)));
            }
        }

        paths
    }
}

/// Pick the generator backend for this run from the configured provider name
pub fn select_provider(name: &str) -> Result<CliProvider> {
    CliProvider::from_config_str(name).ok_or_else(|| {
        AutopostError::Config(format!(
            "Unknown AI provider '{}' (expected claude_code or openclaw)",
            name
        ))
    })
}

/// Result of looking for a provider's binary
#[derive(Debug, Clone)]
pub struct DetectedCli {
    pub provider: CliProvider,
    pub installed: bool,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
}

impl DetectedCli {
    fn missing(provider: CliProvider) -> Self {
        DetectedCli {
            provider,
            installed: false,
            path: None,
            version: None,
        }
    }
}

/// Locate a provider's binary: common install paths first, PATH only when
/// none of them works. A candidate counts only if `--version` succeeds.
pub async fn detect_provider(provider: CliProvider) -> DetectedCli {
    let found = locate(provider.common_paths(), || {
        find_in_path(provider.command_name())
    })
    .await;

    match found {
        Some((path, version)) => DetectedCli {
            provider,
            installed: true,
            path: Some(path),
            version: Some(version),
        },
        None => DetectedCli::missing(provider),
    }
}

/// First candidate answering `--version`; `fallback` runs only if none does
async fn locate<F, Fut>(candidates: Vec<PathBuf>, fallback: F) -> Option<(PathBuf, String)>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<PathBuf>>,
{
    for path in candidates.into_iter().filter(|p| p.exists()) {
        if let Some(version) = check_cli_version(&path).await {
            return Some((path, version));
        }
        tracing::debug!("{} did not answer --version", path.display());
    }

    let path = fallback().await?;
    let version = check_cli_version(&path).await?;
    Some((path, version))
}

/// Run a short probe command and return its trimmed stdout on success
async fn probe(program: &Path, args: &[&str]) -> Option<String> {
    let output = timeout(PROBE_TIMEOUT, Command::new(program).args(args).output())
        .await
        .ok()?
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn find_in_path(command: &str) -> Option<PathBuf> {
    let locator = if cfg!(windows) { "where" } else { "which" };
    let found = probe(Path::new(locator), &[command]).await?;
    found.lines().next().map(|l| PathBuf::from(l.trim()))
}

async fn check_cli_version(path: &Path) -> Option<String> {
    probe(path, &["--version"]).await
}

/// Run the CLI once with `prompt` and return its trimmed stdout.
///
/// Spawn failure, non-zero exit, timeout and empty output are all
/// `Generator` errors.
pub async fn run_cli(
    cli: &DetectedCli,
    prompt: &str,
    model: Option<&str>,
    limit: Duration,
) -> Result<String> {
    let path = cli.path.as_ref().ok_or_else(|| {
        AutopostError::Generator(format!("{} CLI path unknown", cli.provider.display_name()))
    })?;
    let args = cli.provider.build_args(prompt, model);

    tracing::debug!(
        "Invoking {} at {} (model: {})",
        cli.provider.display_name(),
        path.display(),
        model.unwrap_or("default")
    );

    // Session files some CLIs write land in the temp dir, not the working tree
    let mut command = Command::new(path);
    command
        .args(&args)
        .current_dir(std::env::temp_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = timeout(limit, command.output())
        .await
        .map_err(|_| {
            AutopostError::Generator(format!(
                "{} timed out after {}s",
                cli.provider.display_name(),
                limit.as_secs()
            ))
        })?
        .map_err(|e| AutopostError::Generator(format!("Failed to spawn {}: {}", path.display(), e)))?;

    if !output.status.success() {
        return Err(AutopostError::Generator(format!(
            "{} exited with {}: {}",
            cli.provider.display_name(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        return Err(AutopostError::Generator(format!(
            "{} returned no text",
            cli.provider.display_name()
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_str() {
        assert_eq!(
            CliProvider::from_config_str("claude_code"),
            Some(CliProvider::ClaudeCode)
        );
        assert_eq!(
            CliProvider::from_config_str("openclaw"),
            Some(CliProvider::OpenClaw)
        );
        assert_eq!(CliProvider::from_config_str("unknown"), None);
        assert_eq!(CliProvider::from_config_str(""), None);
    }

    #[test]
    fn test_config_str_round_trips() {
        for p in CliProvider::ALL {
            assert_eq!(CliProvider::from_config_str(p.config_str()), Some(p));
        }
    }

    #[test]
    fn test_select_provider() {
        assert_eq!(select_provider("openclaw").unwrap(), CliProvider::OpenClaw);
        assert!(matches!(
            select_provider("gemini"),
            Err(AutopostError::Config(_))
        ));
    }

    #[test]
    fn test_claude_build_args_model() {
        let args = CliProvider::ClaudeCode.build_args("hi", None);
        assert_eq!(&args[..2], &["-p", "hi"]);
        assert!(args.windows(2).any(|w| w[0] == "--model" && w[1] == "sonnet"));

        let args = CliProvider::ClaudeCode.build_args("hi", Some("opus"));
        assert!(args.windows(2).any(|w| w[0] == "--model" && w[1] == "opus"));
    }

    #[test]
    fn test_openclaw_build_args() {
        assert_eq!(
            CliProvider::OpenClaw.build_args("test prompt", None),
            vec!["agent", "--message", "test prompt"]
        );
        assert_eq!(
            CliProvider::OpenClaw.build_args("p", Some("m")),
            vec!["agent", "--message", "p", "--model", "m"]
        );
    }

    #[test]
    fn test_common_paths_use_command_name() {
        for p in CliProvider::ALL {
            assert!(p
                .common_paths()
                .iter()
                .all(|path| path.to_string_lossy().contains(p.command_name())));
        }
    }

    #[cfg(unix)]
    fn fake_cli(dir: &Path) -> PathBuf {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-cli");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"#!/bin/sh\necho fake-cli 1.0\n").unwrap();
        file.sync_all().unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_locate_skips_path_lookup_when_common_path_works() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_cli(dir.path());
        let looked_up = std::cell::Cell::new(false);

        let found = locate(vec![dir.path().join("absent"), cli.clone()], || async {
            looked_up.set(true);
            None
        })
        .await;

        assert_eq!(found, Some((cli, "fake-cli 1.0".to_string())));
        assert!(!looked_up.get());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_locate_falls_back_to_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_cli(dir.path());
        let fallback = cli.clone();

        let found = locate(vec![dir.path().join("absent")], || async move { Some(fallback) }).await;
        assert_eq!(found.map(|(p, _)| p), Some(cli));
    }

    #[tokio::test]
    async fn test_locate_nothing_found() {
        let found = locate(vec![PathBuf::from("/nonexistent/cli")], || async { None }).await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_run_cli_without_path_fails() {
        let cli = DetectedCli::missing(CliProvider::ClaudeCode);
        let err = run_cli(&cli, "prompt", None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AutopostError::Generator(_)));
    }
}
