//! zfs-snapback library
//!
//! Replicates a tree of ZFS filesystems and their snapshots from a source host
//! to a destination host, sending only the snapshots the destination lacks.

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod journal;
pub mod logger;
pub mod progress;
pub mod sync;
pub mod transfer;
pub mod transport;
pub mod tree;
pub mod zfs;

pub use config::{Flags, Settings};
pub use error::{Result, Side, SnapbackError};
pub use sync::{SyncStats, Syncer};
pub use transport::{Location, Transport};
pub use tree::{Fs, Tree};
pub use zfs::Zfs;

/// List the host behind `zfs` and detach the filesystem at `path`.
pub fn get_filesystem<'z>(
    zfs: &'z Zfs,
    path: &str,
    logger: &dyn logger::Logger,
) -> Result<Tree<'z>> {
    logger.listing(zfs.transport().label());
    zfs.list()?.into_child(path)
}
