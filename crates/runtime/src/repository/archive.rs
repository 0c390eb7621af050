//! Optional persistence for finished and running matches.
//!
//! [`FileArchive`] writes one JSON-lines file per match plus an `index.jsonl`
//! of final summaries. Nothing is fsynced; the archive is a convenience for
//! `recent` and `replay`, not a durable store.
//!
//! [`ArchiveSink`] calls block on file I/O. Async callers run them through
//! `tokio::task::spawn_blocking`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use arena_core::MatchConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::types::{MatchSummary, RoundRecord};
use crate::api::SinkError;

const INDEX_FILE: &str = "index.jsonl";

pub trait ArchiveSink: Send + Sync {
    fn record_match_start(&self, config: &MatchConfig) -> Result<(), SinkError>;

    fn record_round(&self, record: &RoundRecord) -> Result<(), SinkError>;

    fn record_match_end(&self, summary: &MatchSummary) -> Result<(), SinkError>;

    /// Final summaries, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<MatchSummary>, SinkError>;

    /// Every archived entry of a match in write order, `None` if unknown.
    fn replay(&self, match_id: &str) -> Result<Option<Vec<Value>>, SinkError>;
}

/// Archive that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopArchive;

impl ArchiveSink for NoopArchive {
    fn record_match_start(&self, _config: &MatchConfig) -> Result<(), SinkError> {
        Ok(())
    }

    fn record_round(&self, _record: &RoundRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn record_match_end(&self, _summary: &MatchSummary) -> Result<(), SinkError> {
        Ok(())
    }

    fn recent(&self, _limit: usize) -> Result<Vec<MatchSummary>, SinkError> {
        Ok(Vec::new())
    }

    fn replay(&self, _match_id: &str) -> Result<Option<Vec<Value>>, SinkError> {
        Ok(None)
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ArchiveEntry<'a> {
    #[serde(rename_all = "camelCase")]
    MatchStart {
        config: &'a MatchConfig,
        recorded_at: DateTime<Utc>,
    },
    Round(&'a RoundRecord),
    MatchEnd(&'a MatchSummary),
}

/// JSON-lines archive rooted at a directory.
pub struct FileArchive {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileArchive {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::debug!("Opened match archive: {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn match_path(&self, match_id: &str) -> Result<PathBuf, SinkError> {
        let valid = !match_id.is_empty()
            && match_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(SinkError::InvalidMatchId(match_id.to_string()));
        }
        Ok(self.dir.join(format!("{match_id}.jsonl")))
    }

    fn append(&self, path: &Path, line: &impl Serialize) -> Result<(), SinkError> {
        let mut bytes = serde_json::to_vec(line)?;
        bytes.push(b'\n');

        let _guard = self.write_lock.lock().map_err(|_| SinkError::LockPoisoned)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    fn read_lines(path: &Path) -> Result<Vec<String>, SinkError> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }
}

impl ArchiveSink for FileArchive {
    fn record_match_start(&self, config: &MatchConfig) -> Result<(), SinkError> {
        let path = self.match_path(&config.match_id)?;
        self.append(
            &path,
            &ArchiveEntry::MatchStart {
                config,
                recorded_at: Utc::now(),
            },
        )
    }

    fn record_round(&self, record: &RoundRecord) -> Result<(), SinkError> {
        let path = self.match_path(&record.match_id)?;
        self.append(&path, &ArchiveEntry::Round(record))
    }

    fn record_match_end(&self, summary: &MatchSummary) -> Result<(), SinkError> {
        let path = self.match_path(&summary.match_id)?;
        self.append(&path, &ArchiveEntry::MatchEnd(summary))?;
        self.append(&self.dir.join(INDEX_FILE), summary)
    }

    fn recent(&self, limit: usize) -> Result<Vec<MatchSummary>, SinkError> {
        let path = self.dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for line in Self::read_lines(&path)?.iter().rev() {
            if summaries.len() >= limit {
                break;
            }
            match serde_json::from_str::<MatchSummary>(line) {
                Ok(summary) => summaries.push(summary),
                Err(err) => tracing::warn!(error = %err, "skipping corrupt archive index line"),
            }
        }
        Ok(summaries)
    }

    fn replay(&self, match_id: &str) -> Result<Option<Vec<Value>>, SinkError> {
        let path = self.match_path(match_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let entries = Self::read_lines(&path)?
            .iter()
            .map(|line| serde_json::from_str(line))
            .collect::<Result<Vec<Value>, _>>()?;
        Ok(Some(entries))
    }
}
