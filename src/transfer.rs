//! Transfer engine: one `zfs send | zfs recv` pair per snapshot
//!
//! The producer is started first. Only then is the in-process copy started
//! together with the consumer, so neither side can block the other from ever
//! starting when an OS pipe buffer fills up. Each process is waited on by its
//! own thread and the first failure to be recorded is the one returned. A
//! producer that dies because the consumer already exited never counts as
//! first.

use parking_lot::Mutex;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::config::Flags;
use crate::error::{Result, Side, SnapbackError};
use crate::logger::Logger;
use crate::progress::TransferProgress;
use crate::transport::command_line;
use crate::zfs::Zfs;

/// A filesystem on a particular host.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub zfs: &'a Zfs,
    pub path: &'a str,
}

/// Arguments for transferring a single snapshot.
#[derive(Debug, Clone)]
pub struct Transfer<'a> {
    pub source: Dataset<'a>,
    pub destination: Dataset<'a>,
    /// `None` sends the full snapshot instead of an increment.
    pub previous: Option<&'a str>,
    pub current: &'a str,
    pub flags: &'a Flags,
}

impl<'a> Transfer<'a> {
    /// `<source>@<current>`
    pub fn snapshot(&self) -> String {
        format!("{}@{}", self.source.path, self.current)
    }

    pub fn recv(&self) -> Command {
        self.destination
            .zfs
            .recv(self.destination.path, self.flags.force)
    }

    pub fn send(&self) -> Command {
        self.source
            .zfs
            .send(self.source.path, self.previous, self.current, false)
    }

    /// Move the snapshot and return the number of stream bytes copied.
    pub fn run(&self, logger: &dyn Logger) -> Result<u64> {
        let result = self.execute(logger);
        match &result {
            Ok(bytes) => logger.transfer_done(self, *bytes),
            Err(e) => logger.transfer_failed(self, e),
        }
        result
    }

    fn execute(&self, logger: &dyn Logger) -> Result<u64> {
        let progress = if self.flags.progress {
            let size = self
                .source
                .zfs
                .send_size(self.source.path, self.previous, self.current)?;
            logger.size_probed(&self.snapshot(), size);
            Some(TransferProgress::new(size, &self.snapshot()))
        } else {
            None
        };
        self.stream_with(logger, progress.as_ref())
    }

    /// Stream the snapshot, finishing `progress` however the stream ends.
    fn stream_with(
        &self,
        logger: &dyn Logger,
        progress: Option<&TransferProgress>,
    ) -> Result<u64> {
        let result = self.stream(logger, progress);
        if let Some(p) = progress {
            match result {
                Ok(_) => p.finish_success(),
                Err(_) => p.finish_error(),
            }
        }
        result
    }

    fn stream(&self, logger: &dyn Logger, progress: Option<&TransferProgress>) -> Result<u64> {
        let mut recv = self.recv();
        let mut send = self.send();
        let send_line = command_line(&send);
        let recv_line = command_line(&recv);
        logger.transfer_start(&send_line, &recv_line);

        let (pipe_reader, pipe_writer) = io::pipe()?;
        send.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        recv.stdin(pipe_reader).stderr(Stdio::piped());

        let mut sender = send
            .spawn()
            .map_err(|e| spawn_failure(Side::Send, &send_line, e))?;
        drop(send);
        logger.process_started(Side::Send, sender.id());

        let send_out = match sender.stdout.take() {
            Some(out) => out,
            None => {
                let _ = sender.kill();
                let _ = sender.wait();
                let err = io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "send output was not captured",
                );
                return Err(err.into());
            }
        };
        let mut reader: Box<dyn Read + Send> = match progress {
            Some(p) => Box::new(p.wrap(send_out)),
            None => Box::new(send_out),
        };

        let first: Mutex<Option<SnapbackError>> = Mutex::new(None);
        let record = |err: SnapbackError| {
            let mut slot = first.lock();
            if slot.is_none() {
                *slot = Some(err);
            } else {
                logger.suppressed(&err);
            }
        };
        let record = &record;
        // Set once the consumer is known to have exited before the producer.
        let consumer_gone = &AtomicBool::new(false);

        let copied = thread::scope(|s| {
            // Ends on EOF from the producer or a write error from a dead consumer.
            // Dropping both ends then unblocks whichever process is still running.
            let copier = s.spawn(move || {
                let mut writer = pipe_writer;
                let copied = io::copy(&mut reader, &mut writer);
                if matches!(&copied, Err(e) if e.kind() == io::ErrorKind::BrokenPipe) {
                    consumer_gone.store(true, Ordering::SeqCst);
                }
                // The producer can only die of SIGPIPE after this.
                drop(reader);
                copied
            });

            let receiver = recv.spawn();
            // Our copy of the pipe's read end must go, or a dead consumer never
            // turns into a write error for the copier.
            drop(recv);
            match receiver {
                Ok(child) => {
                    logger.process_started(Side::Receive, child.id());
                    let recv_line = recv_line.as_str();
                    s.spawn(move || {
                        if let Err(e) = wait(child, Side::Receive, recv_line) {
                            record(e);
                        }
                    });
                }
                Err(e) => record(spawn_failure(Side::Receive, &recv_line, e)),
            }

            let send_line = send_line.as_str();
            s.spawn(move || {
                if let Err(e) = wait(sender, Side::Send, send_line) {
                    if consumer_gone.load(Ordering::SeqCst) {
                        // fallout of the consumer's failure, which wins
                        logger.suppressed(&e);
                    } else {
                        record(e);
                    }
                }
            });

            copier
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stream copy thread panicked")))
        });

        match (first.into_inner(), copied) {
            (None, Ok(bytes)) => Ok(bytes),
            (Some(err), copied) => {
                if let Err(e) = copied {
                    logger.suppressed(&copy_failure(&self.snapshot(), e));
                }
                Err(err)
            }
            (None, Err(e)) => Err(copy_failure(&self.snapshot(), e)),
        }
    }
}

/// Wait for a process while draining its captured stderr.
fn wait(child: Child, side: Side, command: &str) -> Result<()> {
    let out = child.wait_with_output().map_err(|e| SnapbackError::ProcessFailure {
        side,
        command: command.to_string(),
        cause: e.to_string(),
        stderr: String::new(),
    })?;
    if out.status.success() {
        return Ok(());
    }
    Err(SnapbackError::ProcessFailure {
        side,
        command: command.to_string(),
        cause: out.status.to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
    })
}

fn spawn_failure(side: Side, command: &str, e: io::Error) -> SnapbackError {
    SnapbackError::ProcessFailure {
        side,
        command: command.to_string(),
        cause: format!("failed to start: {e}"),
        stderr: String::new(),
    }
}

fn copy_failure(snapshot: &str, e: io::Error) -> SnapbackError {
    io::Error::new(e.kind(), format!("copying stream of {snapshot}: {e}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use crate::transport::Transport;

    #[test]
    fn commands_follow_the_unit() {
        let src = Zfs::new(Transport::local());
        let dst = Zfs::new(Transport::remote("backup", "ssh", None)).with_binary("zfs");
        let flags = Flags {
            force: true,
            ..Flags::default()
        };
        let mut unit = Transfer {
            source: Dataset { zfs: &src, path: "tank/data" },
            destination: Dataset { zfs: &dst, path: "pool/data" },
            previous: None,
            current: "s1",
            flags: &flags,
        };
        assert_eq!(unit.snapshot(), "tank/data@s1");
        assert_eq!(command_line(&unit.send()), "/sbin/zfs send tank/data@s1");
        assert_eq!(command_line(&unit.recv()), "ssh backup zfs recv -F pool/data");

        unit.previous = Some("s1");
        unit.current = "s2";
        assert_eq!(
            command_line(&unit.send()),
            "/sbin/zfs send -i @s1 tank/data@s2"
        );
    }

    #[test]
    fn progress_is_finished_when_producer_cannot_start() {
        let src = Zfs::new(Transport::local()).with_binary("/nonexistent/zfs");
        let dst = Zfs::new(Transport::local());
        let flags = Flags::default();
        let unit = Transfer {
            source: Dataset { zfs: &src, path: "tank/data" },
            destination: Dataset { zfs: &dst, path: "pool/data" },
            previous: None,
            current: "s1",
            flags: &flags,
        };
        let progress = TransferProgress::hidden(100);

        let err = unit.stream_with(&NoopLogger, Some(&progress)).unwrap_err();

        assert_eq!(err.side(), Some(Side::Send));
        assert!(progress.is_finished());
    }
}
