//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "zfs-snapback - replicate ZFS filesystems and snapshots between hosts"
)]
pub struct Cli {
    /// Settings file (defaults to ~/.config/zfs-snapback/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Transfer the snapshots the destination is missing
    Sync(SyncOpts),
    /// Print the filesystems and snapshots of a host
    List {
        /// [user@host:]pool/filesystem
        location: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SyncOpts {
    /// Source location, [user@host:]pool/filesystem
    pub source: String,

    /// Destination location, [user@host:]pool/filesystem
    pub destination: String,

    /// Descend into child filesystems, creating missing ones
    #[arg(short, long)]
    pub recursive: bool,

    /// Force a rollback of the destination before receiving (zfs recv -F)
    #[arg(short, long)]
    pub force: bool,

    /// Show a progress bar for each snapshot
    #[arg(short, long)]
    pub progress: bool,

    /// Remote shell compression setting, forwarded as -o Compression=<ID>
    #[arg(short = 'c', long, value_name = "ID")]
    pub compression: Option<String>,

    /// Append timestamped event lines to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Append one JSON line per transfer to this file
    #[arg(long)]
    pub journal: Option<PathBuf>,
}

impl SyncOpts {
    /// Command-line flags switch settings on; they never switch them off.
    pub fn apply(&self, settings: &mut Settings) {
        let flags = &mut settings.flags;
        flags.recursive |= self.recursive;
        flags.force |= self.force;
        flags.progress |= self.progress;
        if self.compression.is_some() {
            flags.compression = self.compression.clone();
        }
        if self.log_file.is_some() {
            settings.log_file = self.log_file.clone();
        }
        if self.journal.is_some() {
            settings.journal = self.journal.clone();
        }
    }
}
