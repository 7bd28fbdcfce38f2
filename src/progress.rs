//! Byte progress for a single snapshot stream
//!
//! The total comes from the dry-run size probe; the live count comes from
//! wrapping the producer's output stream before it is copied to the consumer.

use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressBarIter, ProgressDrawTarget, ProgressStyle};
use std::io::Read;
use std::time::{Duration, Instant};

pub struct TransferProgress {
    bar: ProgressBar,
    total: u64,
    start_time: Instant,
}

impl TransferProgress {
    /// Bar drawn on stderr. Nothing is drawn when stderr is not a terminal.
    pub fn new(total: u64, snapshot: &str) -> Self {
        Self::with_target(total, snapshot, ProgressDrawTarget::stderr())
    }

    pub fn hidden(total: u64) -> Self {
        Self::with_target(total, "", ProgressDrawTarget::hidden())
    }

    fn with_target(total: u64, snapshot: &str, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), target);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(snapshot.to_string());
        bar.enable_steady_tick(Duration::from_millis(200));
        Self {
            bar,
            total,
            start_time: Instant::now(),
        }
    }

    /// Count bytes as they are read from `reader`.
    pub fn wrap<R: Read>(&self, reader: R) -> ProgressBarIter<R> {
        self.bar.wrap_read(reader)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes read through [`TransferProgress::wrap`] so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }

    pub fn finish_success(&self) {
        // The estimate is not exact; show a full bar on success.
        self.bar.set_position(self.total.max(self.bar.position()));
        let elapsed = self.start_time.elapsed();
        self.bar.finish_with_message(format!(
            "{} {:.1} MB in {:.1}s",
            "Received".with(Color::Green).bold(),
            self.bar.position() as f64 / 1_048_576.0,
            elapsed.as_secs_f64()
        ));
    }

    pub fn finish_error(&self) {
        self.bar
            .abandon_with_message(format!("{}", "Failed".with(Color::Red).bold()));
    }
}
