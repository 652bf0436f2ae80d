//! Progress events emitted while a batch runs.
//!
//! The dispatcher reports through a [`ProgressSink`]; the binary prints with
//! [`ConsoleSink`] and tests inspect a [`MemorySink`].

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use std::time::Duration;

use tracing::warn;

use crate::pool::panic_message;
use crate::work::{SleepProcessor, WorkItem};

/// One observable step of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A slot picked up an item.
    Started {
        index: usize,
        slot: usize,
        item: WorkItem,
    },
    /// The processor returned successfully.
    Finished {
        index: usize,
        slot: usize,
        item: WorkItem,
        elapsed: Duration,
    },
    /// The processor returned an error or panicked.
    Failed {
        index: usize,
        slot: usize,
        item: WorkItem,
        reason: String,
    },
    /// The item was never started because the batch was aborted.
    Skipped { index: usize, item: WorkItem },
    /// Emitted exactly once, after every slot has been joined.
    BatchFinished {
        completed: usize,
        failed: usize,
        skipped: usize,
        elapsed: Duration,
    },
}

impl ProgressEvent {
    /// The console line for this event.
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::Started { item, .. } => format!("{} - Started processing", item),
            ProgressEvent::Finished { item, .. } => format!("{} - Finished processing", item),
            ProgressEvent::Failed { item, reason, .. } => format!("{} - Failed: {}", item, reason),
            ProgressEvent::Skipped { item, .. } => format!("{} - Skipped", item),
            ProgressEvent::BatchFinished {
                failed, skipped, ..
            } => {
                if *failed == 0 && *skipped == 0 {
                    "Finished processing everything".to_string()
                } else {
                    format!(
                        "Finished processing everything ({} failed, {} skipped)",
                        failed, skipped
                    )
                }
            }
        }
    }
}

/// Receives progress events from concurrently running slots.
pub trait ProgressSink: Send + Sync + 'static {
    fn emit(&self, event: ProgressEvent);
}

/// Deliver `event` to `sink`, containing a panicking sink so that the
/// caller's bookkeeping survives it.
pub(crate) fn emit_guarded<S: ProgressSink + ?Sized>(sink: &S, event: ProgressEvent) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| sink.emit(event))) {
        warn!(
            reason = %panic_message(payload.as_ref()),
            "progress sink panicked, event dropped"
        );
    }
}

/// Prints one line per event to stdout.
///
/// Built with [`ConsoleSink::for_sleep`], start lines name the simulated
/// latency (`"a - Sleeping for 2 seconds..."`). Write errors such as a
/// closed pipe are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink {
    latency: Option<Duration>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_sleep(processor: &SleepProcessor) -> Self {
        Self {
            latency: Some(processor.latency()),
        }
    }

    fn line(&self, event: &ProgressEvent) -> String {
        match (event, self.latency) {
            (ProgressEvent::Started { item, .. }, Some(latency)) => format!(
                "{} - Sleeping for {} seconds...",
                item,
                latency.as_secs_f64()
            ),
            _ => event.message(),
        }
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, event: ProgressEvent) {
        let line = self.line(&event);
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
    }
}

/// Records events in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
