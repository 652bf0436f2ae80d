//! Work items and the per-item work function.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::trace;

use crate::error::TaskFailure;

/// One unit of input handed to exactly one worker slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkItem {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WorkItem {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The work performed for each item.
///
/// Implementations must not block the runtime thread; any waiting belongs
/// behind an `.await` so that other slots keep making progress.
pub trait Processor: Send + Sync + 'static {
    fn process(&self, item: &WorkItem) -> impl Future<Output = Result<(), TaskFailure>> + Send;
}

/// Simulated work: waits a fixed latency, then succeeds.
#[derive(Debug, Clone, Copy)]
pub struct SleepProcessor {
    latency: Duration,
}

impl SleepProcessor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Processor for SleepProcessor {
    fn process(&self, item: &WorkItem) -> impl Future<Output = Result<(), TaskFailure>> + Send {
        let latency = self.latency;
        let item = item.clone();
        async move {
            trace!(item = %item, ?latency, "sleeping");
            tokio::time::sleep(latency).await;
            Ok(())
        }
    }
}
