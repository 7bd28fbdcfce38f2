//! Snapshot diff: which source snapshots the destination is missing

use crate::error::{Result, SnapbackError};
use crate::tree::Fs;

/// Index in `source` of the last snapshot that also exists in `destination`.
///
/// The last match is the incremental base; an older name that happens to
/// reappear on the destination must not win over a newer common snapshot.
pub fn last_common_index(source: &[String], destination: &[String]) -> Option<usize> {
    source
        .iter()
        .enumerate()
        .filter(|(_, name)| destination.contains(name))
        .map(|(i, _)| i)
        .last()
}

/// Ordered transfers needed to bring one destination filesystem up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan<'a> {
    /// Snapshot the first transfer is incremental from, `None` for a full send.
    pub base: Option<&'a str>,
    pub missing: &'a [String],
}

impl<'a> SyncPlan<'a> {
    pub fn compute(from: &'a Fs, to: &Fs) -> Result<Self> {
        let source = from.snapshots();
        if to.snapshots().is_empty() {
            return Ok(Self {
                base: None,
                missing: source,
            });
        }
        match last_common_index(source, to.snapshots()) {
            Some(i) => Ok(Self {
                base: Some(source[i].as_str()),
                missing: &source[i + 1..],
            }),
            None => Err(SnapbackError::DivergedHistory {
                from: from.full_path().to_string(),
                to: to.full_path().to_string(),
            }),
        }
    }

    /// `(previous, current)` pairs in transfer order.
    pub fn steps(&self) -> impl Iterator<Item = (Option<&'a str>, &'a str)> + '_ {
        let mut previous = self.base;
        self.missing.iter().map(move |current| {
            let step = (previous, current.as_str());
            previous = Some(current.as_str());
            step
        })
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }
}
