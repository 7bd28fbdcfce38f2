//! Run flags and the optional TOML settings file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SnapbackError};
use crate::transport::DEFAULT_SSH;
use crate::zfs::DEFAULT_ZFS;

/// Options for a sync run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flags {
    /// Descend into child filesystems, creating them on the destination.
    pub recursive: bool,
    /// Pass `-F` to `zfs recv`.
    pub force: bool,
    /// Probe the stream size first and show a progress bar.
    pub progress: bool,
    /// Forwarded to the remote shell as `-o Compression=<id>`.
    pub compression: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub zfs_binary: String,
    pub ssh_binary: String,
    pub log_file: Option<PathBuf>,
    pub journal: Option<PathBuf>,
    #[serde(flatten)]
    pub flags: Flags,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            zfs_binary: DEFAULT_ZFS.to_string(),
            ssh_binary: DEFAULT_SSH.to_string(),
            log_file: None,
            journal: None,
            flags: Flags::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let config_error = |reason: String| SnapbackError::Config {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        Self::from_toml(&text).map_err(|e| config_error(e.to_string()))
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = config_dir().join("config.toml");
                if default.is_file() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

pub fn config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config").join("zfs-snapback");
    }
    PathBuf::from(".zfs-snapback")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.zfs_binary, "/sbin/zfs");
        assert!(!s.flags.recursive);
    }

    #[test]
    fn flags_live_at_top_level() {
        let s = Settings::from_toml(
            r#"
zfs_binary = "/usr/local/sbin/zfs"
recursive = true
compression = "yes"
journal = "/var/log/snapback.jsonl"
"#,
        )
        .unwrap();
        assert_eq!(s.zfs_binary, "/usr/local/sbin/zfs");
        assert_eq!(s.ssh_binary, DEFAULT_SSH);
        assert!(s.flags.recursive);
        assert!(!s.flags.force);
        assert_eq!(s.flags.compression.as_deref(), Some("yes"));
        assert_eq!(s.journal, Some(PathBuf::from("/var/log/snapback.jsonl")));
    }

    #[test]
    fn bad_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "recursive = \"maybe\"").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SnapbackError::Config { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn missing_explicit_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Settings::load_or_default(Some(&path)).unwrap_err();
        match err {
            SnapbackError::Config { path: reported, .. } => {
                assert!(reported.ends_with("absent.toml"), "{reported}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
