//! Preview log and run payload
//!
//! The preview log is an append-only Markdown file with one section per
//! generated post:
//!
//! ```text
//! ## Post Preview (2026-10-19T09:00:00+09:00)
//!
//! <post text>
//!
//! - provider: claude_code
//!
//! Posted: https://x.com/i/web/status/123
//! ```
//!
//! It doubles as the recovery source for the history index, so dry runs are
//! written under a different heading that recovery skips. The payload file
//! holds only the latest run and is overwritten every time.

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Heading text that opens every entry
pub const ENTRY_MARKER: &str = "Post Preview (";

/// Heading for dry-run sections; never read back as history
pub const DRY_RUN_MARKER: &str = "Dry Run Preview (";

/// Heading text written by older releases
const LEGACY_ENTRY_MARKER: &str = "Tweet Preview (";

/// Label some older entries put between the heading and the text
const CONTENT_LABEL: &str = "**Content:**";

/// One section of the preview log
#[derive(Debug, Clone, Default)]
pub struct PreviewEntry {
    pub text: String,
    pub metadata: Vec<(String, String)>,
    pub posted_url: Option<String>,
    pub dry_run: bool,
}

impl PreviewEntry {
    pub fn new(text: impl Into<String>) -> Self {
        PreviewEntry {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.posted_url = url;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Append-only Markdown log of generated posts
#[derive(Debug, Clone)]
pub struct PreviewLog {
    path: PathBuf,
}

impl PreviewLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PreviewLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry section
    pub fn append(&self, entry: &PreviewEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let ts = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
        let marker = if entry.dry_run {
            DRY_RUN_MARKER
        } else {
            ENTRY_MARKER
        };
        let mut section = format!("\n\n## {}{})\n\n", marker, ts);
        section.push_str(&entry.text.replace(['\r', '\n'], " "));
        section.push_str("\n\n");

        if !entry.metadata.is_empty() {
            for (key, value) in &entry.metadata {
                section.push_str(&format!("- {}: {}\n", key, value));
            }
            section.push('\n');
        }

        if let Some(url) = &entry.posted_url {
            section.push_str(&format!("Posted: {}\n", url));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(section.as_bytes())?;
        Ok(())
    }

    /// Entry texts in log order. A missing log has no entries.
    pub fn entries(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(parse_entries(&content))
    }
}

fn is_marker(line: &str) -> bool {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return false;
    }
    let heading = trimmed.trim_start_matches('#').trim_start();
    heading.starts_with(ENTRY_MARKER) || heading.starts_with(LEGACY_ENTRY_MARKER)
}

/// First non-blank line after each marker heading
pub fn parse_entries(content: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut pending = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if pending && !trimmed.is_empty() {
            if trimmed == CONTENT_LABEL {
                continue;
            }
            entries.push(trimmed.to_string());
            pending = false;
        } else if is_marker(line) {
            pending = true;
        }
    }

    entries
}

/// Outcome of the posting step, as written to the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResult {
    pub success: bool,
    pub dry_run: bool,
    pub post_id: Option<String>,
    pub url: Option<String>,
    pub posted_at: Option<String>,
    pub error: Option<String>,
}

/// Latest run, overwritten every time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub text: String,
    pub generated_at: String,
    pub provider: String,
    pub model: Option<String>,
    pub topic: Option<String>,
    /// "accepted" or "mutated"
    pub resolution: String,
    pub attempts: u32,
    pub result: PostResult,
}

/// Overwrite the payload file
pub fn save_payload(path: &Path, payload: &Payload) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(payload)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = PreviewLog::new(dir.path().join("out").join("preview.md"));

        log.append(
            &PreviewEntry::new("First line\nwraps")
                .with_meta("provider", "claude_code")
                .with_url(Some("https://x.com/i/web/status/1".to_string())),
        )
        .unwrap();
        log.append(&PreviewEntry::new("#Rust second post")).unwrap();
        log.append(&PreviewEntry::new("never published").dry_run(true))
            .unwrap();

        assert_eq!(
            log.entries().unwrap(),
            vec!["First line wraps".to_string(), "#Rust second post".to_string()]
        );

        let raw = fs::read_to_string(log.path()).unwrap();
        assert!(raw.contains("- provider: claude_code"));
        assert!(raw.contains("Posted: https://x.com/i/web/status/1"));
        assert!(raw.contains("## Dry Run Preview ("));
    }

    #[test]
    fn test_missing_log_has_no_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = PreviewLog::new(dir.path().join("preview.md"));
        assert!(log.entries().unwrap().is_empty());
    }

    #[test]
    fn test_parse_legacy_sections() {
        let content = "\n\n# Tweet Preview (2025-01-01T00:00:00+09:00)\n\nOld style post\n\nPosted: x\n\
                       \n\n## Tweet Preview (2025-01-02T00:00:00+09:00)\n\n**Content:**\nLabelled post\n\n\
                       **Metadata:**\n- model: gpt\n";
        assert_eq!(
            parse_entries(content),
            vec!["Old style post".to_string(), "Labelled post".to_string()]
        );
    }

    #[test]
    fn test_parse_ignores_unrelated_headings() {
        let content = "# Notes\n\nnot an entry\n\n## Post Preview (t)\n\n\n  padded text  \n";
        assert_eq!(parse_entries(content), vec!["padded text".to_string()]);
    }

    #[test]
    fn test_save_payload_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        let mut payload = Payload {
            text: "first".to_string(),
            generated_at: "now".to_string(),
            provider: "claude_code".to_string(),
            model: None,
            topic: None,
            resolution: "accepted".to_string(),
            attempts: 1,
            result: PostResult {
                success: true,
                dry_run: true,
                post_id: Some("dry-run-1".to_string()),
                url: None,
                posted_at: None,
                error: None,
            },
        };
        save_payload(&path, &payload).unwrap();
        payload.text = "second".to_string();
        save_payload(&path, &payload).unwrap();

        let loaded: Payload = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.text, "second");
        assert!(loaded.result.success);
    }
}
