//! In-memory forest of filesystems and their ordered snapshot lists
//!
//! Built once per host from `zfs list -t all -Hr -o name` output. Children are
//! kept in a `BTreeMap` so iteration is always lexicographic by name.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use crate::error::{Result, SnapbackError};
use crate::zfs::Zfs;

/// One filesystem (dataset). The forest root has an empty path and name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fs {
    full_path: String,
    name: String,
    children: BTreeMap<String, Fs>,
    snapshots: Vec<String>,
}

impl Fs {
    fn new(full_path: String) -> Self {
        let name = match full_path.rfind('/') {
            Some(i) => full_path[i + 1..].to_string(),
            None => full_path.clone(),
        };
        Self {
            full_path,
            name,
            children: BTreeMap::new(),
            snapshots: Vec::new(),
        }
    }

    /// Parse a newline-delimited listing into a forest root.
    ///
    /// Each line is either a filesystem path or `path@snapshot`. A filesystem
    /// must be listed after its parent, and a snapshot after its filesystem.
    pub fn parse(listing: &str) -> Result<Fs> {
        let mut root = Fs::default();
        for line in listing.lines().map(str::trim_end) {
            if line.is_empty() {
                continue;
            }
            if line.contains('@') {
                root.add_snapshot(line)?;
            } else {
                root.add_filesystem(line)?;
            }
        }
        Ok(root)
    }

    fn add_snapshot(&mut self, line: &str) -> Result<()> {
        let (path, snap) = line
            .split_once('@')
            .ok_or_else(|| SnapbackError::malformed(line, "missing `@`"))?;
        if snap.is_empty() || snap.contains('@') {
            return Err(SnapbackError::malformed(
                line,
                "expected exactly one `@` followed by a snapshot name",
            ));
        }
        let fs = self
            .get_child_mut(path)
            .map_err(|e| SnapbackError::malformed(line, format!("snapshot of unlisted filesystem: {e}")))?;
        fs.snapshots.push(snap.to_string());
        Ok(())
    }

    fn add_filesystem(&mut self, line: &str) -> Result<()> {
        let components: Vec<&str> = line.split('/').collect();
        if components.iter().any(|c| c.is_empty()) {
            return Err(SnapbackError::malformed(line, "empty path component"));
        }

        let mut cur = self;
        for (i, component) in components.iter().enumerate() {
            let last = i + 1 == components.len();
            cur = match cur.children.entry(component.to_string()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(_) if !last => {
                    return Err(SnapbackError::malformed(
                        line,
                        format!("parent `{}` was not listed before it", components[..=i].join("/")),
                    ));
                }
                Entry::Vacant(e) => e.insert(Fs::new(line.to_string())),
            };
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Snapshot names in listing (creation) order.
    pub fn snapshots(&self) -> &[String] {
        &self.snapshots
    }

    /// Direct children, ordered by name.
    pub fn children(&self) -> impl Iterator<Item = &Fs> {
        self.children.values()
    }

    pub fn child(&self, name: &str) -> Option<&Fs> {
        self.children.get(name)
    }

    /// Resolve `path` (e.g. `zroot/var/cache`) below this node.
    pub fn get_child(&self, path: &str) -> Result<&Fs> {
        let (head, rest) = split_head(path);
        let child = self.children.get(head).ok_or_else(|| self.not_found(head))?;
        match rest {
            Some(rest) => child.get_child(rest),
            None => Ok(child),
        }
    }

    pub fn get_child_mut(&mut self, path: &str) -> Result<&mut Fs> {
        let (head, rest) = split_head(path);
        let within = &self.full_path;
        match (self.children.get_mut(head), rest) {
            (Some(child), Some(rest)) => child.get_child_mut(rest),
            (Some(child), None) => Ok(child),
            (None, _) => Err(SnapbackError::NotFound {
                segment: head.to_string(),
                within: within.clone(),
            }),
        }
    }

    /// Detach the filesystem at `path` from this forest.
    pub fn into_child(mut self, path: &str) -> Result<Fs> {
        let node = self.get_child_mut(path)?;
        Ok(std::mem::take(node))
    }

    /// Resolve a path whose first segment is this node's own name.
    ///
    /// On the forest root (empty name) this is the same as [`Fs::get_child`].
    pub fn get(&self, path: &str) -> Result<&Fs> {
        if self.name.is_empty() {
            return self.get_child(path);
        }
        let (head, rest) = split_head(path);
        if head != self.name {
            return Err(SnapbackError::NotFound {
                segment: head.to_string(),
                within: parent_of(&self.full_path).to_string(),
            });
        }
        match rest {
            Some(rest) => self.get_child(rest),
            None => Ok(self),
        }
    }

    /// Return the direct child `name`, creating the filesystem on the host first
    /// when it does not exist yet.
    ///
    /// # Panics
    ///
    /// When `name` contains a `/`; only direct children can be created.
    pub(crate) fn create_if_missing(&mut self, zfs: &Zfs, name: &str) -> Result<&mut Fs> {
        assert!(!name.contains('/'), "slashes not allowed in names: {name}");

        let path = if self.full_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.full_path, name)
        };
        match self.children.entry(name.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                zfs.create(&path)?;
                Ok(e.insert(Fs::new(path)))
            }
        }
    }

    fn not_found(&self, segment: &str) -> SnapbackError {
        SnapbackError::NotFound {
            segment: segment.to_string(),
            within: self.full_path.clone(),
        }
    }

    fn write_level(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        writeln!(f, "{} -> {}", "  ".repeat(level), self.name)?;
        for snap in &self.snapshots {
            writeln!(f, "{} @> {}", "  ".repeat(level + 2), snap)?;
        }
        for child in self.children() {
            child.write_level(f, level + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Fs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.full_path)?;
        for snap in &self.snapshots {
            writeln!(f, "{} @> {}", "  ".repeat(2), snap)?;
        }
        for child in self.children() {
            child.write_level(f, 1)?;
        }
        Ok(())
    }
}

/// A listed filesystem bound to the host it was listed from.
///
/// Everything below the root is reached through the same `Zfs` handle, so
/// filesystems created while syncing always land on that host.
#[derive(Debug, Clone)]
pub struct Tree<'z> {
    zfs: &'z Zfs,
    root: Fs,
}

impl<'z> Tree<'z> {
    pub(crate) fn new(zfs: &'z Zfs, root: Fs) -> Self {
        Self { zfs, root }
    }

    /// The host this tree was listed from.
    pub fn zfs(&self) -> &'z Zfs {
        self.zfs
    }

    pub(crate) fn root_mut(&mut self) -> &mut Fs {
        &mut self.root
    }

    /// Detach the filesystem at `path`, keeping it bound to the same host.
    pub fn into_child(self, path: &str) -> Result<Tree<'z>> {
        Ok(Tree {
            zfs: self.zfs,
            root: self.root.into_child(path)?,
        })
    }
}

impl Deref for Tree<'_> {
    type Target = Fs;

    fn deref(&self) -> &Fs {
        &self.root
    }
}

impl fmt::Display for Tree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}
