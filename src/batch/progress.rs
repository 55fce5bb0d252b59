//! Progress reporting seam between the batch worker and whatever presents it.
//!
//! The worker only ever calls [`ProgressSink`] methods. Sinks are invoked from
//! the worker thread, so they must be `Send + Sync` and should return quickly.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use log::{debug, error, info, warn};

use crate::batch::job::BatchOutcome;
use crate::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome {
    Pending,
    Success,
    Failure(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 1-based position of the file in enumeration order.
    pub index: usize,
    pub total: usize,
    pub filename: String,
    pub outcome: ProgressOutcome,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.outcome, ProgressOutcome::Pending)
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.index as f64 / self.total as f64 * 100.0
    }
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);

    fn on_complete(&self, outcome: &BatchOutcome);

    /// The input directory exists but holds no file on the allow-list.
    fn on_no_input(&self, input_dir: &Path);
}

/// Prints progress lines and the final summary to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn on_progress(&self, event: ProgressEvent) {
        match &event.outcome {
            ProgressOutcome::Pending => println!("Processing: {}", event.filename),
            ProgressOutcome::Success => println!(
                "Progress: {}/{} files ({:.1}%) - converted {}",
                event.index,
                event.total,
                event.percent(),
                event.filename
            ),
            ProgressOutcome::Failure(kind) => println!(
                "Progress: {}/{} files ({:.1}%) - FAILED {}: {}",
                event.index,
                event.total,
                event.percent(),
                event.filename,
                kind
            ),
        }
    }

    fn on_complete(&self, outcome: &BatchOutcome) {
        println!("\n=== Conversion Complete ===");
        println!("Total files: {}", outcome.total);
        println!("Succeeded: {}", outcome.succeeded.len());
        println!("Failed: {}", outcome.failed.len());
        for (task, kind) in &outcome.failed {
            println!("  {}: {}", task.file_name(), kind);
        }
        if outcome.cancelled {
            println!("Cancelled: {} files not processed", outcome.skipped.len());
        }
    }

    fn on_no_input(&self, input_dir: &Path) {
        println!("No valid audio files found in {}", input_dir.display());
    }
}

/// Routes events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_progress(&self, event: ProgressEvent) {
        match &event.outcome {
            ProgressOutcome::Pending => {
                debug!("[{}/{}] {}", event.index, event.total, event.filename)
            }
            ProgressOutcome::Success => {
                info!("[{}/{}] {} converted", event.index, event.total, event.filename)
            }
            ProgressOutcome::Failure(kind) => {
                error!("[{}/{}] {} failed: {}", event.index, event.total, event.filename, kind)
            }
        }
    }

    fn on_complete(&self, outcome: &BatchOutcome) {
        info!(
            "Batch complete: {} succeeded, {} failed of {}{}",
            outcome.succeeded.len(),
            outcome.failed.len(),
            outcome.total,
            if outcome.cancelled { " (cancelled)" } else { "" }
        );
    }

    fn on_no_input(&self, input_dir: &Path) {
        warn!("No valid audio files found in {}", input_dir.display());
    }
}

/// Sink messages as plain values, for consumers on another thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    Progress(ProgressEvent),
    Complete(BatchOutcome),
    NoInput(PathBuf),
}

/// Forwards every callback over a channel. A dropped receiver is ignored so
/// a closed UI never stalls the batch.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<ProgressMessage>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }

    fn send(&self, message: ProgressMessage) {
        if self.sender.send(message).is_err() {
            debug!("Progress receiver dropped; discarding message");
        }
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, event: ProgressEvent) {
        self.send(ProgressMessage::Progress(event));
    }

    fn on_complete(&self, outcome: &BatchOutcome) {
        self.send(ProgressMessage::Complete(outcome.clone()));
    }

    fn on_no_input(&self, input_dir: &Path) {
        self.send(ProgressMessage::NoInput(input_dir.to_path_buf()));
    }
}
