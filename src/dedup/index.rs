//! History index of previously published texts
//!
//! The durable store is a pretty-printed JSON array of
//! `{ "normalized_text": ..., "fingerprint": ... }` records, rewritten in full
//! on every change (temp file + rename). Record order is insertion order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::normalize::normalize;
use super::shingle::shingles;
use super::similarity::{fingerprint_shingles, nearest, Neighbor};
use crate::error::Result;
use crate::preview::PreviewLog;

/// One previously emitted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub normalized_text: String,
    pub fingerprint: u64,
}

impl HistoryRecord {
    /// Normalize and fingerprint raw text
    pub fn from_text(raw: &str, shingle_size: usize) -> Self {
        let normalized_text = normalize(raw);
        let fingerprint = fingerprint_shingles(&shingles(&normalized_text, shingle_size));
        HistoryRecord {
            normalized_text,
            fingerprint,
        }
    }
}

/// A generated text scored against the index. Never persisted unless accepted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub raw_text: String,
    pub normalized_text: String,
    pub fingerprint: u64,
    /// Jaccard score against the nearest record (0.0 with no history)
    pub jaccard_score: f64,
    /// Hamming distance to the nearest record (64 with no history)
    pub hamming_distance: u32,
    /// Position of the nearest record
    pub nearest: Option<usize>,
}

impl Candidate {
    /// Duplicate when either signal crosses its threshold
    pub fn is_duplicate(&self, jaccard_threshold: f64, hamming_threshold: u32) -> bool {
        self.jaccard_score >= jaccard_threshold || self.hamming_distance <= hamming_threshold
    }
}

/// Persisted collection of `HistoryRecord`s.
///
/// Sole owner of the in-memory list; assumes a single writer process.
pub struct HistoryIndex {
    path: PathBuf,
    shingle_size: usize,
    records: Vec<HistoryRecord>,
}

impl HistoryIndex {
    /// Empty index backed by `path`. Nothing is read or written.
    pub fn new(path: impl Into<PathBuf>, shingle_size: usize) -> Self {
        HistoryIndex {
            path: path.into(),
            shingle_size,
            records: Vec::new(),
        }
    }

    /// Startup path: load the durable store, rebuild it from the preview log
    /// when it is missing or unreadable, then reconcile with the log.
    ///
    /// An unreadable preview log is skipped with a warning: the store is used
    /// as-is and nothing is rebuilt or persisted from the log.
    pub fn open(path: impl Into<PathBuf>, log: &PreviewLog, shingle_size: usize) -> Result<Self> {
        let mut index = HistoryIndex::new(path, shingle_size);
        let stored = read_store(&index.path);

        let entries = match log.entries() {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(
                    "Preview log {} is unreadable ({}), skipping recovery from it",
                    log.path().display(),
                    e
                );
                None
            }
        };

        match stored {
            Ok(Some(records)) => {
                tracing::debug!(
                    "Loaded {} history records from {}",
                    records.len(),
                    index.path.display()
                );
                index.records = records;
            }
            Ok(None) => {
                tracing::info!(
                    "History index {} not found, rebuilding from preview log",
                    index.path.display()
                );
                index.rebuild_from_entries(entries.as_deref());
            }
            Err(e) => {
                tracing::warn!(
                    "History index {} is unreadable ({}), rebuilding from preview log",
                    index.path.display(),
                    e
                );
                index.rebuild_from_entries(entries.as_deref());
            }
        }

        if let Some(entries) = &entries {
            let added = index.reconcile(entries);
            if added > 0 {
                tracing::info!("Reconciled {} preview log entries into the history index", added);
            }
        }

        Ok(index)
    }

    fn rebuild_from_entries(&mut self, entries: Option<&[String]>) {
        if let Some(entries) = entries {
            self.records = rebuild_from_texts(entries, self.shingle_size);
            self.persist_best_effort();
        }
    }

    /// Read the durable store into memory. A missing or corrupt store
    /// leaves the index empty.
    pub fn load(&mut self) -> Vec<HistoryRecord> {
        self.records = match read_store(&self.path) {
            Ok(Some(records)) => records,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    "Failed to read history index {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        };
        self.records.clone()
    }

    /// Replace the in-memory list with records rebuilt from the preview log
    /// and persist them. Returns the rebuilt records.
    pub fn rebuild_from_log(&mut self, log: &PreviewLog) -> Result<Vec<HistoryRecord>> {
        let entries = log.entries()?;
        self.records = rebuild_from_texts(&entries, self.shingle_size);
        self.persist()?;
        tracing::info!(
            "Rebuilt history index with {} records from {}",
            self.records.len(),
            log.path().display()
        );
        Ok(self.records.clone())
    }

    /// Append a record for every log text not already indexed.
    /// Returns the number of records added.
    pub fn reconcile(&mut self, log_texts: &[String]) -> usize {
        let mut known: HashSet<String> = self
            .records
            .iter()
            .map(|r| r.normalized_text.clone())
            .collect();

        let mut added = 0;
        for text in log_texts {
            let record = HistoryRecord::from_text(text, self.shingle_size);
            if record.normalized_text.is_empty() || known.contains(&record.normalized_text) {
                continue;
            }
            known.insert(record.normalized_text.clone());
            self.records.push(record);
            added += 1;
        }

        if added > 0 {
            self.persist_best_effort();
        }
        added
    }

    /// Add one record and immediately persist the full list.
    ///
    /// The in-memory list is updated first; a failed write is logged and the
    /// record goes out with the next successful persist.
    pub fn append(&mut self, record: HistoryRecord) {
        self.records.push(record);
        self.persist_best_effort();
    }

    /// Atomically overwrite the durable store with the full record list
    pub fn persist(&self) -> Result<()> {
        write_store(&self.path, &self.records)
    }

    fn persist_best_effort(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!(
                "Failed to persist history index {}: {}",
                self.path.display(),
                e
            );
        }
    }

    /// Score raw text against every record
    pub fn score(&self, raw_text: &str) -> Candidate {
        let normalized_text = normalize(raw_text);
        let set = shingles(&normalized_text, self.shingle_size);
        let fingerprint = fingerprint_shingles(&set);
        let Neighbor {
            index,
            jaccard,
            hamming,
        } = nearest(&set, fingerprint, &self.records, self.shingle_size);

        Candidate {
            raw_text: raw_text.to_string(),
            normalized_text,
            fingerprint,
            jaccard_score: jaccard,
            hamming_distance: hamming,
            nearest: index,
        }
    }

    /// Whether the normalized form of `text` is already indexed
    pub fn contains(&self, text: &str) -> bool {
        let normalized = normalize(text);
        self.records.iter().any(|r| r.normalized_text == normalized)
    }

    pub fn get(&self, position: usize) -> Option<&HistoryRecord> {
        self.records.get(position)
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn shingle_size(&self) -> usize {
        self.shingle_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fresh records for log texts, skipping empty and repeated normalized forms
fn rebuild_from_texts(texts: &[String], shingle_size: usize) -> Vec<HistoryRecord> {
    let mut seen = HashSet::new();
    texts
        .iter()
        .map(|t| HistoryRecord::from_text(t, shingle_size))
        .filter(|r| !r.normalized_text.is_empty() && seen.insert(r.normalized_text.clone()))
        .collect()
}

/// `Ok(None)` when the store does not exist
fn read_store(path: &Path) -> Result<Option<Vec<HistoryRecord>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let records: Vec<HistoryRecord> = serde_json::from_str(&content)?;
    Ok(Some(records))
}

fn write_store(path: &Path, records: &[HistoryRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let json = serde_json::to_string_pretty(records)?;
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::{PreviewEntry, PreviewLog};

    fn index_in(dir: &Path) -> HistoryIndex {
        HistoryIndex::new(dir.join("history_index.json"), 2)
    }

    fn write_log(dir: &Path, texts: &[&str]) -> PreviewLog {
        let log = PreviewLog::new(dir.join("preview.md"));
        for text in texts {
            log.append(&PreviewEntry::new(*text)).unwrap();
        }
        log
    }

    #[test]
    fn test_append_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(dir.path());
        index.append(HistoryRecord::from_text("First post!", 2));
        index.append(HistoryRecord::from_text("Second post.", 2));

        let mut reloaded = index_in(dir.path());
        let records = reloaded.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].normalized_text, "first post");
        assert_eq!(records[1].normalized_text, "second post");
        assert_eq!(reloaded.records(), index.records());
    }

    #[test]
    fn test_store_is_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(dir.path());
        index.append(HistoryRecord::from_text("hello", 2));

        let raw = fs::read_to_string(index.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr[0]["normalized_text"], "hello");
        assert!(arr[0]["fingerprint"].is_u64());
        assert!(!dir.path().join("history_index.json.tmp").exists());
    }

    #[test]
    fn test_load_corrupt_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("history_index.json"), "{not json").unwrap();
        let mut index = index_in(dir.path());
        assert!(index.load().is_empty());
    }

    #[test]
    fn test_append_survives_persist_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the store file should be makes every write fail
        let blocked = dir.path().join("blocked");
        fs::create_dir_all(blocked.join("history_index.json.tmp")).unwrap();
        let mut index = HistoryIndex::new(blocked.join("history_index.json"), 2);

        index.append(HistoryRecord::from_text("kept in memory", 2));
        assert_eq!(index.len(), 1);
        assert!(index.contains("Kept in memory!"));
        assert!(!blocked.join("history_index.json").exists());

        // The next successful write carries the earlier record too
        fs::remove_dir(blocked.join("history_index.json.tmp")).unwrap();
        index.append(HistoryRecord::from_text("written later", 2));

        let mut reloaded = HistoryIndex::new(blocked.join("history_index.json"), 2);
        let texts: Vec<String> = reloaded
            .load()
            .into_iter()
            .map(|r| r.normalized_text)
            .collect();
        assert_eq!(texts, vec!["kept in memory", "written later"]);
    }

    #[test]
    fn test_load_clears_stale_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(dir.path());
        index.append(HistoryRecord::from_text("on disk", 2));

        fs::remove_file(index.path()).unwrap();
        assert!(index.load().is_empty());
        assert!(index.is_empty());

        index.append(HistoryRecord::from_text("again", 2));
        fs::write(index.path(), "[broken").unwrap();
        assert!(index.load().is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_open_keeps_index_when_log_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(dir.path());
        index.append(HistoryRecord::from_text("healthy record", 2));

        let log = PreviewLog::new(dir.path().join("preview.md"));
        fs::write(log.path(), b"## Post Preview (t)\n\nbad \xff byte\n").unwrap();

        let opened = HistoryIndex::open(dir.path().join("history_index.json"), &log, 2).unwrap();
        assert_eq!(opened.len(), 1);
        assert!(opened.contains("healthy record"));
    }

    #[test]
    fn test_open_without_store_or_readable_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = PreviewLog::new(dir.path().join("preview.md"));
        fs::write(log.path(), [0xff, 0xfe, 0x00]).unwrap();

        let opened = HistoryIndex::open(dir.path().join("history_index.json"), &log, 2).unwrap();
        assert!(opened.is_empty());
        assert!(!dir.path().join("history_index.json").exists());
    }

    #[test]
    fn test_open_rebuilds_missing_index_from_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), &["Post one", "Post two", "POST ONE!"]);

        let index = HistoryIndex::open(dir.path().join("history_index.json"), &log, 2).unwrap();
        assert_eq!(index.len(), 2);
        assert!(dir.path().join("history_index.json").exists());
    }

    #[test]
    fn test_open_rebuilds_corrupt_index_from_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), &["Recovered post"]);
        fs::write(dir.path().join("history_index.json"), "garbage").unwrap();

        let index = HistoryIndex::open(dir.path().join("history_index.json"), &log, 2).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.records()[0].normalized_text, "recovered post");
    }

    #[test]
    fn test_reconcile_adds_only_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(dir.path());
        index.append(HistoryRecord::from_text("alpha post", 2));
        index.append(HistoryRecord::from_text("beta post", 2));

        let log = write_log(
            dir.path(),
            &["Alpha post!", "beta POST", "gamma post", "delta post", "epsilon post"],
        );
        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 5);

        let added = index.reconcile(&entries);
        assert_eq!(added, 3);
        assert_eq!(index.len(), 5);

        let distinct: HashSet<&str> = index
            .records()
            .iter()
            .map(|r| r.normalized_text.as_str())
            .collect();
        assert_eq!(distinct.len(), 5);

        // Persisted as well
        let mut reloaded = index_in(dir.path());
        assert_eq!(reloaded.load().len(), 5);

        // Second pass is a no-op
        assert_eq!(index.reconcile(&entries), 0);
    }

    #[test]
    fn test_open_reconciles_existing_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(dir.path());
        index.append(HistoryRecord::from_text("one", 2));
        index.append(HistoryRecord::from_text("two", 2));

        let log = write_log(dir.path(), &["one", "two", "three", "four", "five"]);
        let opened = HistoryIndex::open(dir.path().join("history_index.json"), &log, 2).unwrap();
        assert_eq!(opened.len(), 5);
        assert_eq!(opened.records()[0].normalized_text, "one");
        assert_eq!(opened.records()[4].normalized_text, "five");
    }

    #[test]
    fn test_score_scenario_exact_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(dir.path());
        index.append(HistoryRecord::from_text("ai technology is changing fast", 2));

        let candidate = index.score("AI Technology is changing FAST!!");
        assert_eq!(candidate.normalized_text, "ai technology is changing fast");
        assert!((candidate.jaccard_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(candidate.hamming_distance, 0);
        assert_eq!(candidate.nearest, Some(0));
        assert!(candidate.is_duplicate(0.80, 3));
    }

    #[test]
    fn test_score_empty_index_is_not_duplicate() {
        let index = HistoryIndex::new("unused.json", 2);
        let candidate = index.score("anything at all");
        assert_eq!(candidate.jaccard_score, 0.0);
        assert_eq!(candidate.hamming_distance, 64);
        assert!(candidate.nearest.is_none());
        assert!(!candidate.is_duplicate(0.80, 3));
    }
}
