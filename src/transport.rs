//! Command transport: run a named program locally or through a remote shell
//!
//! A [`Transport`] is a single concrete value holding a command-construction
//! function. Everything that needs to talk to a host (listing, create, send,
//! receive) goes through it, so the rest of the crate never cares whether the
//! host is local or remote.

use std::fmt;
use std::process::Command;
use std::sync::Arc;

/// Default remote shell used for remote locations.
pub const DEFAULT_SSH: &str = "/usr/bin/ssh";

type BuildFn = dyn Fn(&str, &[String]) -> Command + Send + Sync;

#[derive(Clone)]
pub struct Transport {
    label: String,
    build: Arc<BuildFn>,
}

impl Transport {
    /// Run commands on this machine.
    pub fn local() -> Self {
        Self::custom("local", |name, args| {
            let mut cmd = Command::new(name);
            cmd.args(args);
            cmd
        })
    }

    /// Run commands through `ssh <dialstring>`.
    ///
    /// The compression identifier is forwarded untouched as
    /// `-o Compression=<id>` ahead of the dialstring.
    pub fn remote(dialstring: &str, ssh: &str, compression: Option<&str>) -> Self {
        let dialstring = dialstring.to_string();
        let ssh = ssh.to_string();
        let compression = compression.map(str::to_string);
        Self::custom(format!("ssh {dialstring}"), move |name, args| {
            let mut cmd = Command::new(&ssh);
            if let Some(c) = &compression {
                cmd.arg("-o").arg(format!("Compression={c}"));
            }
            cmd.arg(&dialstring).arg(name).args(args);
            cmd
        })
    }

    /// Inject any command-construction strategy.
    pub fn custom<F>(label: impl Into<String>, build: F) -> Self
    where
        F: Fn(&str, &[String]) -> Command + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            build: Arc::new(build),
        }
    }

    pub fn command(&self, name: &str, args: &[String]) -> Command {
        (self.build)(name, args)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").field("label", &self.label).finish()
    }
}

/// Render a command the way a shell user would type it.
pub fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A dataset location: `[dialstring:]dataset/path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// `user@host` style target for the remote shell, `None` when local.
    pub remote: Option<String>,
    pub path: String,
}

impl Location {
    /// Split on the last `:`. Everything before it is the remote dialstring,
    /// which keeps bracketed IPv6 hosts like `user@[2001::dead:beef]` intact.
    pub fn parse(location: &str) -> Self {
        match location.rfind(':') {
            Some(colon) => Self {
                remote: Some(location[..colon].to_string()),
                path: location[colon + 1..].to_string(),
            },
            None => Self {
                remote: None,
                path: location.to_string(),
            },
        }
    }

    pub fn transport(&self, ssh: &str, compression: Option<&str>) -> Transport {
        match &self.remote {
            Some(dial) => Transport::remote(dial, ssh, compression),
            None => Transport::local(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.remote {
            Some(remote) => write!(f, "{}:{}", remote, self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn location_paths() {
        for loc in [
            "foo/bar",
            "remote:foo/bar",
            "user@remote.host:foo/bar",
            "user@[2001::dead:beef]:foo/bar",
        ] {
            assert_eq!(Location::parse(loc).path, "foo/bar", "for location {loc}");
        }
        assert_eq!(Location::parse("foo/bar").remote, None);
        assert_eq!(
            Location::parse("user@[2001::dead:beef]:foo/bar").remote.as_deref(),
            Some("user@[2001::dead:beef]")
        );
    }

    #[test]
    fn remote_prefixes_connection_arguments() {
        let t = Transport::remote("root@backup", DEFAULT_SSH, Some("yes"));
        let cmd = t.command("/sbin/zfs", &["list".to_string()]);
        assert_eq!(cmd.get_program(), DEFAULT_SSH);
        assert_eq!(
            args_of(&cmd),
            ["-o", "Compression=yes", "root@backup", "/sbin/zfs", "list"]
        );

        let plain = Transport::remote("backup", DEFAULT_SSH, None);
        assert_eq!(
            args_of(&plain.command("zfs", &[])),
            ["backup", "zfs"]
        );
    }

    #[test]
    fn local_runs_directly() {
        let cmd = Transport::local().command("/sbin/zfs", &["create".into(), "tank/a".into()]);
        assert_eq!(command_line(&cmd), "/sbin/zfs create tank/a");
    }
}
