use anyhow::Result;
use chrono::Utc;
use crossterm::style::{Color, Stylize};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Side, SnapbackError};
use crate::transfer::Transfer;

/// Observer for everything a sync run does. All methods default to no-ops.
pub trait Logger: Send + Sync {
    fn listing(&self, _host: &str) {}
    fn sync_start(&self, _from: &str, _to: &str) {}
    fn created(&self, _path: &str) {}
    /// The two composed command lines of one transfer.
    fn transfer_start(&self, _send: &str, _recv: &str) {}
    fn process_started(&self, _side: Side, _pid: u32) {}
    fn size_probed(&self, _snapshot: &str, _bytes: u64) {}
    fn transfer_done(&self, _transfer: &Transfer<'_>, _bytes: u64) {}
    fn transfer_failed(&self, _transfer: &Transfer<'_>, _err: &SnapbackError) {}
    /// A failure that lost the race to be the returned error of a transfer.
    fn suppressed(&self, _err: &SnapbackError) {}
    fn done(&self, _transfers: u64, _bytes: u64, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Human readable progress lines on stderr.
pub struct ConsoleLogger {
    quiet: bool,
}

impl ConsoleLogger {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn info(&self, s: &str) {
        if !self.quiet {
            eprintln!("{s}");
        }
    }
}

impl Logger for ConsoleLogger {
    fn listing(&self, host: &str) {
        self.info(&format!("Listing {host}"));
    }
    fn sync_start(&self, from: &str, to: &str) {
        self.info(&format!("Synchronize {from} to {to}"));
    }
    fn created(&self, path: &str) {
        self.info(&format!("Created {path}"));
    }
    fn transfer_start(&self, send: &str, recv: &str) {
        self.info(&format!("Running {send} | {recv}"));
    }
    fn transfer_failed(&self, transfer: &Transfer<'_>, err: &SnapbackError) {
        eprintln!(
            "{} {}: {}",
            "Failed".with(Color::Red).bold(),
            transfer.snapshot(),
            err
        );
    }
    fn suppressed(&self, err: &SnapbackError) {
        eprintln!("{} {}", "Warning:".with(Color::Yellow).bold(), err);
    }
    fn done(&self, transfers: u64, bytes: u64, seconds: f64) {
        self.info(&format!(
            "{} {} snapshots ({:.1} MB) in {:.1}s",
            "Completed".with(Color::Green).bold(),
            transfers,
            bytes as f64 / 1_048_576.0,
            seconds
        ));
    }
}

/// Timestamped `EVENT key=value` lines appended to a file.
pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        let mut f = self.file.lock();
        let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
    }
}

impl Logger for TextLogger {
    fn listing(&self, host: &str) {
        self.line(&format!("LIST host={host}"));
    }
    fn sync_start(&self, from: &str, to: &str) {
        self.line(&format!("SYNC src={from} dst={to}"));
    }
    fn created(&self, path: &str) {
        self.line(&format!("CREATE path={path}"));
    }
    fn transfer_start(&self, send: &str, recv: &str) {
        self.line(&format!("RUN send=\"{send}\" recv=\"{recv}\""));
    }
    fn process_started(&self, side: Side, pid: u32) {
        self.line(&format!("SPAWN side={side} pid={pid}"));
    }
    fn size_probed(&self, snapshot: &str, bytes: u64) {
        self.line(&format!("SIZE snapshot={snapshot} bytes={bytes}"));
    }
    fn transfer_done(&self, transfer: &Transfer<'_>, bytes: u64) {
        self.line(&format!(
            "RECV snapshot={} dst={} bytes={}",
            transfer.snapshot(),
            transfer.destination.path,
            bytes
        ));
    }
    fn transfer_failed(&self, transfer: &Transfer<'_>, err: &SnapbackError) {
        self.line(&format!(
            "ERROR snapshot={} dst={} msg={}",
            transfer.snapshot(),
            transfer.destination.path,
            err
        ));
    }
    fn suppressed(&self, err: &SnapbackError) {
        self.line(&format!("WARN suppressed msg={err}"));
    }
    fn done(&self, transfers: u64, bytes: u64, seconds: f64) {
        self.line(&format!(
            "DONE transfers={transfers} bytes={bytes} seconds={seconds:.3}"
        ));
    }
}

/// Forward every event to several loggers.
pub struct FanoutLogger {
    loggers: Vec<Arc<dyn Logger>>,
}

impl FanoutLogger {
    pub fn new(loggers: Vec<Arc<dyn Logger>>) -> Self {
        Self { loggers }
    }
}

impl Logger for FanoutLogger {
    fn listing(&self, host: &str) {
        self.loggers.iter().for_each(|l| l.listing(host));
    }
    fn sync_start(&self, from: &str, to: &str) {
        self.loggers.iter().for_each(|l| l.sync_start(from, to));
    }
    fn created(&self, path: &str) {
        self.loggers.iter().for_each(|l| l.created(path));
    }
    fn transfer_start(&self, send: &str, recv: &str) {
        self.loggers.iter().for_each(|l| l.transfer_start(send, recv));
    }
    fn process_started(&self, side: Side, pid: u32) {
        self.loggers.iter().for_each(|l| l.process_started(side, pid));
    }
    fn size_probed(&self, snapshot: &str, bytes: u64) {
        self.loggers.iter().for_each(|l| l.size_probed(snapshot, bytes));
    }
    fn transfer_done(&self, transfer: &Transfer<'_>, bytes: u64) {
        self.loggers.iter().for_each(|l| l.transfer_done(transfer, bytes));
    }
    fn transfer_failed(&self, transfer: &Transfer<'_>, err: &SnapbackError) {
        self.loggers.iter().for_each(|l| l.transfer_failed(transfer, err));
    }
    fn suppressed(&self, err: &SnapbackError) {
        self.loggers.iter().for_each(|l| l.suppressed(err));
    }
    fn done(&self, transfers: u64, bytes: u64, seconds: f64) {
        self.loggers
            .iter()
            .for_each(|l| l.done(transfers, bytes, seconds));
    }
}
