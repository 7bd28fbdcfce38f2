//! The `zfs` command surface: listing, create, send, receive
//!
//! Only builds command lines and runs the short-lived ones (list, create,
//! dry-run send). Long-running send/receive pairs are driven by
//! [`crate::transfer`].

use std::process::{Command, Output};

use crate::error::{Result, Side, SnapbackError};
use crate::transport::{command_line, Transport};
use crate::tree::{Fs, Tree};

pub const DEFAULT_ZFS: &str = "/sbin/zfs";

/// Access to the ZFS installation of one host.
///
/// One handle is shared by reference by every node of the tree listed from it.
#[derive(Debug, Clone)]
pub struct Zfs {
    transport: Transport,
    binary: String,
}

impl Zfs {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            binary: DEFAULT_ZFS.to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn command(&self, args: &[String]) -> Command {
        self.transport.command(&self.binary, args)
    }

    /// All filesystems and snapshots of the host as a forest bound to `self`.
    pub fn list(&self) -> Result<Tree<'_>> {
        let cmd = self.command(&strings(&["list", "-t", "all", "-Hr", "-o", "name"]));
        let out = run_output(cmd, Side::List)?;
        let root = Fs::parse(&String::from_utf8_lossy(&out.stdout))?;
        Ok(Tree::new(self, root))
    }

    /// Create a filesystem by its full path.
    pub fn create(&self, path: &str) -> Result<()> {
        let cmd = self.command(&strings(&["create", path]));
        run_output(cmd, Side::Create)
            .map(|_| ())
            .map_err(|cause| SnapbackError::CreationFailed {
                path: path.to_string(),
                cause: Box::new(cause),
            })
    }

    /// `zfs recv [-F] <fs>`
    pub fn recv(&self, fs: &str, force: bool) -> Command {
        let mut args = vec!["recv".to_string()];
        if force {
            // -F must be passed before the filesystem argument
            args.push("-F".into());
        }
        args.push(fs.to_string());
        self.command(&args)
    }

    /// `zfs send [-n -P] [-i @<previous>] <fs>@<current>`
    ///
    /// Without a previous snapshot this is a full send. `dry_run` asks for the
    /// parsable size estimate instead of a stream.
    pub fn send(&self, fs: &str, previous: Option<&str>, current: &str, dry_run: bool) -> Command {
        let mut args = vec!["send".to_string()];
        if dry_run {
            args.push("-n".into());
            args.push("-P".into());
        }
        if let Some(prev) = previous {
            args.push("-i".into());
            args.push(format!("@{prev}"));
        }
        args.push(format!("{fs}@{current}"));
        self.command(&args)
    }

    /// Run the dry-run send and extract its `size` line.
    pub fn send_size(&self, fs: &str, previous: Option<&str>, current: &str) -> Result<u64> {
        let snapshot = format!("{fs}@{current}");
        let cmd = self.send(fs, previous, current, true);
        let out = run_output(cmd, Side::SizeProbe).map_err(|e| SnapbackError::SizeProbeFailed {
            snapshot: snapshot.clone(),
            reason: e.to_string(),
        })?;
        parse_size(&String::from_utf8_lossy(&out.stdout)).map_err(|reason| {
            SnapbackError::SizeProbeFailed { snapshot, reason }
        })
    }
}

/// Find the `size\t<bytes>` line of `zfs send -nP` output.
pub fn parse_size(output: &str) -> std::result::Result<u64, String> {
    let line = output
        .lines()
        .find_map(|line| line.strip_prefix("size\t"))
        .ok_or_else(|| "no size field found".to_string())?;
    line.trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid size `{}`: {e}", line.trim()))
}

fn run_output(mut cmd: Command, side: Side) -> Result<Output> {
    let command = command_line(&cmd);
    let out = cmd.output().map_err(|e| SnapbackError::ProcessFailure {
        side,
        command: command.clone(),
        cause: e.to_string(),
        stderr: String::new(),
    })?;
    if !out.status.success() {
        return Err(SnapbackError::ProcessFailure {
            side,
            command,
            cause: out.status.to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(out)
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
