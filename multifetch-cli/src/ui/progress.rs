//! Progress bar fed by download progress events.

use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use multifetch::download::ProgressSink;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";

/// Renders staged bytes as an `indicatif` bar.
pub struct BarSink {
    bar: ProgressBar,
    chunks: AtomicUsize,
    completed: AtomicUsize,
}

impl BarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        Self {
            bar,
            chunks: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Hidden bar for non-interactive output.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            chunks: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Stop drawing, leaving the final state on screen.
    pub fn finish(&self) {
        self.bar.finish();
    }

    /// Remove the bar, e.g. before printing an error.
    pub fn abandon(&self) {
        self.bar.abandon();
    }

    /// Bytes shown as done.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    fn update_message(&self) {
        self.bar.set_message(format!(
            "chunks {}/{}",
            self.completed.load(Ordering::SeqCst),
            self.chunks.load(Ordering::SeqCst)
        ));
    }
}

impl Default for BarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarSink {
    fn job_started(&self, total_bytes: u64, chunks: usize) {
        self.chunks.store(chunks, Ordering::SeqCst);
        self.bar.set_length(total_bytes);
        self.update_message();
    }

    fn chunk_resumed(&self, _index: usize, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn bytes_persisted(&self, _index: usize, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn chunk_completed(&self, _index: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.update_message();
    }
}
