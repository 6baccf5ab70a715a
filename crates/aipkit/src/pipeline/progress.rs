use std::sync::atomic::{AtomicUsize, Ordering};

use crate::pipeline::runner::AipOutcome;

/// Events emitted by the pipeline as it works through a batch.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { aip_id: String },
    Finished { aip_id: String, outcome: AipOutcome },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for tests and library callers.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Prints one line per AIP for the operator.
pub struct ConsoleProgress {
    total: usize,
    finished: AtomicUsize,
}

impl ConsoleProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            finished: AtomicUsize::new(0),
        }
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { aip_id } => {
                println!("Starting {}", aip_id);
            }
            ProgressEvent::Finished { aip_id, outcome } => {
                let done = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
                println!("[{}/{}] {}: {}", done, self.total, aip_id, outcome);
            }
        }
    }
}
