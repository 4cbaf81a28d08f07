use crate::errors::{AppError, ResultExt};
use crate::models::{SyncMode, TrackingEntry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// A tracker row waiting to be appended, tagged with the tracker it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub mode: SyncMode,
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub row: TrackingEntry,
}

impl JournalEntry {
    pub fn new(mode: SyncMode, spreadsheet_id: &str, row: TrackingEntry) -> Self {
        Self {
            mode,
            spreadsheet_id: spreadsheet_id.to_string(),
            row,
        }
    }

    /// Whether this row was journaled by a run writing to the given tracker.
    pub fn belongs_to(&self, mode: SyncMode, spreadsheet_id: &str) -> bool {
        self.mode == mode && self.spreadsheet_id == spreadsheet_id
    }
}

/// Local record of campaign pushes whose tracker append failed.
///
/// One JSON-encoded [`JournalEntry`] per line. Both sync binaries may share
/// the file; a run only replays the entries tagged with its own mode and
/// spreadsheet and leaves the rest in place. Replayed emails count as
/// processed whether or not the append succeeds, so a pushed email is never
/// pushed again.
pub struct UnloggedJournal {
    path: PathBuf,
}

impl UnloggedJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads every pending entry; a missing file means nothing is pending.
    ///
    /// Lines that do not parse are logged and dropped.
    pub async fn pending(&self) -> Result<Vec<JournalEntry>, AppError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Reading journal {}", self.path.display()))
            }
        };

        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    "Skipping unreadable journal line {} in {}: {}",
                    idx + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }

    /// Durably records an entry the tracker did not accept.
    pub async fn record(&self, entry: &JournalEntry) -> Result<(), AppError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Opening journal {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("Writing journal entry")?;
        file.sync_all().await.context("Syncing journal")?;

        tracing::warn!(
            "Journaled {} in {} for replay on the next run",
            entry.row.email,
            self.path.display()
        );
        Ok(())
    }

    /// Replaces the journal with `remaining`, removing the file when empty.
    pub async fn rewrite(&self, remaining: &[JournalEntry]) -> Result<(), AppError> {
        if remaining.is_empty() {
            return match fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).context("Removing drained journal"),
            };
        }

        let mut content = String::new();
        for entry in remaining {
            content.push_str(&serde_json::to_string(entry)?);
            content.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, content)
            .await
            .with_context(|| format!("Writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Replacing journal {}", self.path.display()))?;
        Ok(())
    }
}
