//! A fake `zfs` for driving real send/receive processes in tests.
//!
//! Each host is a temp directory holding a `listing` file (what `zfs list`
//! prints), a `log` of the mutating commands it ran, and optional marker files
//! that make a command fail.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Command;

use snapback::logger::Logger;
use snapback::transfer::Transfer;
use snapback::{Side, SnapbackError, Transport, Tree, Zfs};

const FAKE_ZFS: &str = r#"
here=$(dirname "$0")
cmd=$1
shift
case "$cmd" in
list)
    cat "$here/listing"
    ;;
create)
    if [ -e "$here/fail-create" ]; then
        echo "cannot create '$1': permission denied" >&2
        exit 1
    fi
    echo "$1" >> "$here/listing"
    echo "create $1" >> "$here/log"
    ;;
send)
    dry=0
    prev=full
    while [ $# -gt 1 ]; do
        case "$1" in
        -n) dry=1 ;;
        -i) shift; prev=$1 ;;
        esac
        shift
    done
    snap=${1#*@}
    if [ $dry = 1 ]; then
        printf 'incremental\t%s\t%s\n' "$prev" "$1"
        [ -e "$here/no-size" ] || printf 'size\t1234\n'
        exit 0
    fi
    if [ -e "$here/fail-send-$snap" ]; then
        echo "cannot send $1: I/O error" >&2
        exit 1
    fi
    echo "send $prev $1" >> "$here/log"
    echo "$snap"
    ;;
recv)
    force=""
    while [ $# -gt 1 ]; do
        [ "$1" = "-F" ] && force=" -F"
        shift
    done
    if ! read -r snap; then
        [ -e "$here/slow-fail" ] && sleep 1
        echo "cannot receive: empty stream" >&2
        exit 1
    fi
    if [ -e "$here/fail-recv-$snap" ]; then
        echo "cannot receive $snap: destination has been modified" >&2
        exit 1
    fi
    echo "$1@$snap" >> "$here/listing"
    echo "recv$force $1@$snap" >> "$here/log"
    ;;
*)
    echo "unsupported command $cmd" >&2
    exit 2
    ;;
esac
"#;

pub struct FakeHost {
    dir: tempfile::TempDir,
    zfs: Zfs,
}

impl FakeHost {
    pub fn new(listing: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("zfs"), FAKE_ZFS).expect("write fake zfs");
        let mut text = listing.join("\n");
        text.push('\n');
        std::fs::write(dir.path().join("listing"), text).expect("write listing");
        // Commands go through `sh <script>` so the script never has to be exec'd.
        let script = dir.path().join("zfs");
        let zfs = Zfs::new(Transport::custom("fake", move |_name, args| {
            let mut cmd = Command::new("sh");
            cmd.arg(&script).args(args);
            cmd
        }));
        Self { dir, zfs }
    }

    pub fn zfs(&self) -> &Zfs {
        &self.zfs
    }

    pub fn mark(&self, marker: &str) {
        std::fs::write(self.dir.path().join(marker), "").expect("write marker");
    }

    pub fn log(&self) -> Vec<String> {
        std::fs::read_to_string(self.path("log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn get(&self, path: &str) -> Tree<'_> {
        self.zfs
            .list()
            .and_then(|root| root.into_child(path))
            .expect("listed filesystem")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// A host whose `zfs` is a fixed shell snippet, whatever the arguments.
pub fn scripted(label: &str, script: &'static str) -> Zfs {
    Zfs::new(Transport::custom(label, move |_name, _args| {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }))
}

/// Records the events the assertions care about.
#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<String>>,
    suppressed: Mutex<Vec<Option<Side>>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn suppressed(&self) -> Vec<Option<Side>> {
        self.suppressed.lock().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl Logger for RecordingLogger {
    fn created(&self, path: &str) {
        self.push(format!("created {path}"));
    }
    fn process_started(&self, side: Side, _pid: u32) {
        self.push(format!("started {side}"));
    }
    fn size_probed(&self, snapshot: &str, bytes: u64) {
        self.push(format!("size {snapshot} {bytes}"));
    }
    fn transfer_done(&self, transfer: &Transfer<'_>, _bytes: u64) {
        self.push(format!("done {}", transfer.snapshot()));
    }
    fn suppressed(&self, err: &SnapbackError) {
        self.suppressed.lock().push(err.side());
    }
}
