//! JSONL journal with one entry per snapshot transfer

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::SnapbackError;
use crate::logger::Logger;
use crate::transfer::Transfer;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JournalEntry {
    pub timestamp: String,
    pub sync_job_id: String,
    pub source: String,
    pub destination: String,
    pub previous: Option<String>,
    pub current: String,
    pub status: TransferStatus,
    pub bytes_transferred: u64,
    pub error: Option<String>,
}

pub struct JournalLogger {
    path: PathBuf,
    sync_job_id: String,
    file: Mutex<File>,
}

impl JournalLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open transfer journal")?;
        Ok(Self {
            path,
            sync_job_id: Uuid::new_v4().to_string(),
            file: Mutex::new(file),
        })
    }

    pub fn sync_job_id(&self) -> &str {
        &self.sync_job_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut file = self.file.lock();
        let mut writer = BufWriter::new(&mut *file);
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn entry(
        &self,
        transfer: &Transfer<'_>,
        status: TransferStatus,
        bytes: u64,
        error: Option<String>,
    ) -> JournalEntry {
        JournalEntry {
            timestamp: Utc::now().to_rfc3339(),
            sync_job_id: self.sync_job_id.clone(),
            source: transfer.source.path.to_string(),
            destination: transfer.destination.path.to_string(),
            previous: transfer.previous.map(str::to_string),
            current: transfer.current.to_string(),
            status,
            bytes_transferred: bytes,
            error,
        }
    }
}

impl Logger for JournalLogger {
    fn transfer_done(&self, transfer: &Transfer<'_>, bytes: u64) {
        let entry = self.entry(transfer, TransferStatus::Completed, bytes, None);
        if let Err(e) = self.append(&entry) {
            eprintln!("journal {}: {e:#}", self.path.display());
        }
    }

    fn transfer_failed(&self, transfer: &Transfer<'_>, err: &SnapbackError) {
        let entry = self.entry(transfer, TransferStatus::Failed, 0, Some(err.to_string()));
        if let Err(e) = self.append(&entry) {
            eprintln!("journal {}: {e:#}", self.path.display());
        }
    }
}

pub fn read_journal(path: &Path) -> Result<Vec<JournalEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).context("Failed to open transfer journal for reading")?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: JournalEntry = serde_json::from_str(&line)?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Flags;
    use crate::error::Side;
    use crate::transfer::Dataset;
    use crate::transport::Transport;
    use crate::zfs::Zfs;

    #[test]
    fn entries_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let journal = JournalLogger::new(&path).unwrap();

        let zfs = Zfs::new(Transport::local());
        let flags = Flags::default();
        let unit = Transfer {
            source: Dataset { zfs: &zfs, path: "tank/a" },
            destination: Dataset { zfs: &zfs, path: "backup/a" },
            previous: Some("s1"),
            current: "s2",
            flags: &flags,
        };
        journal.transfer_done(&unit, 4096);
        journal.transfer_failed(
            &Transfer { previous: Some("s2"), current: "s3", ..unit.clone() },
            &SnapbackError::ProcessFailure {
                side: Side::Receive,
                command: "zfs recv backup/a".into(),
                cause: "exit status: 1".into(),
                stderr: "out of space".into(),
            },
        );

        let entries = read_journal(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, TransferStatus::Completed);
        assert_eq!(entries[0].previous.as_deref(), Some("s1"));
        assert_eq!(entries[0].bytes_transferred, 4096);
        assert_eq!(entries[1].status, TransferStatus::Failed);
        assert_eq!(entries[1].current, "s3");
        assert!(entries[1].error.as_deref().unwrap().contains("out of space"));
        assert!(entries.iter().all(|e| e.sync_job_id == journal.sync_job_id()));
    }

    #[test]
    fn missing_journal_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_journal(&dir.path().join("none.jsonl")).unwrap().is_empty());
    }
}
