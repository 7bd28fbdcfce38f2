//! Sync driver: bring a destination filesystem (and optionally its children)
//! up to date with a source filesystem.
//!
//! Strictly sequential and fail-fast. The first error aborts the run and is
//! returned unchanged; running the sync again picks up where it stopped.

use std::time::Instant;

use crate::config::Flags;
use crate::diff::SyncPlan;
use crate::error::Result;
use crate::logger::Logger;
use crate::transfer::{Dataset, Transfer};
use crate::tree::{Fs, Tree};
use crate::zfs::Zfs;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub transfers: u64,
    pub bytes: u64,
    pub created: u64,
}

/// Both ends of a sync, each the host its tree was listed from.
#[derive(Clone, Copy)]
struct Hosts<'z> {
    source: &'z Zfs,
    destination: &'z Zfs,
}

pub struct Syncer<'a> {
    flags: &'a Flags,
    logger: &'a dyn Logger,
}

impl<'a> Syncer<'a> {
    pub fn new(flags: &'a Flags, logger: &'a dyn Logger) -> Self {
        Self { flags, logger }
    }

    /// Bring `to` up to date with `from`. Sends run against the host `from`
    /// was listed from, receives and creates against the host of `to`.
    pub fn sync(&self, from: &Tree<'_>, to: &mut Tree<'_>) -> Result<SyncStats> {
        let start = Instant::now();
        let mut stats = SyncStats::default();
        let hosts = Hosts {
            source: from.zfs(),
            destination: to.zfs(),
        };
        self.sync_into(hosts, from, to.root_mut(), &mut stats)?;
        self.logger
            .done(stats.transfers, stats.bytes, start.elapsed().as_secs_f64());
        Ok(stats)
    }

    fn sync_into(
        &self,
        hosts: Hosts<'_>,
        from: &Fs,
        to: &mut Fs,
        stats: &mut SyncStats,
    ) -> Result<()> {
        self.logger.sync_start(from.full_path(), to.full_path());

        if !from.snapshots().is_empty() {
            let plan = SyncPlan::compute(from, to)?;
            for (previous, current) in plan.steps() {
                let transfer = Transfer {
                    source: Dataset {
                        zfs: hosts.source,
                        path: from.full_path(),
                    },
                    destination: Dataset {
                        zfs: hosts.destination,
                        path: to.full_path(),
                    },
                    previous,
                    current,
                    flags: self.flags,
                };
                stats.bytes += transfer.run(self.logger)?;
                stats.transfers += 1;
            }
        }

        if self.flags.recursive {
            for child in from.children() {
                let existed = to.child(child.name()).is_some();
                let to_child = to.create_if_missing(hosts.destination, child.name())?;
                if !existed {
                    self.logger.created(to_child.full_path());
                    stats.created += 1;
                }
                self.sync_into(hosts, child, to_child, stats)?;
            }
        }

        Ok(())
    }
}
