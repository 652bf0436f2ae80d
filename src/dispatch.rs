//! Batch dispatch over a scoped worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::FailurePolicy;
use crate::error::{DispatchError, Result, TaskFailure};
use crate::pool::{ItemRecord, Outcome, WorkerPool};
use crate::progress::{emit_guarded, ConsoleSink, ProgressEvent, ProgressSink};
use crate::work::{Processor, SleepProcessor, WorkItem};

/// Result of a finished batch.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// One record per submitted item, in submission order.
    pub records: Vec<ItemRecord>,
    /// Wall time from pool creation until the last slot was joined.
    pub elapsed: Duration,
}

impl DispatchReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn completed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Skipped))
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskFailure> {
        self.records.iter().filter_map(|record| match &record.outcome {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        })
    }

    /// True when every item completed.
    pub fn is_success(&self) -> bool {
        self.completed() == self.records.len()
    }

    /// Lines describing every failed and skipped item, empty on success.
    pub fn failure_summary(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .failures()
            .map(|failure| format!("  - {}", failure))
            .collect();
        if self.skipped() > 0 {
            lines.push(format!("  {} item(s) skipped", self.skipped()));
        }
        lines
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Submits a batch of items to a fresh pool and waits for all of them.
pub struct Dispatcher<P, S> {
    pool_size: usize,
    failure_policy: FailurePolicy,
    processor: Arc<P>,
    sink: Arc<S>,
}

impl<P: Processor, S: ProgressSink> Dispatcher<P, S> {
    pub fn new(pool_size: usize, processor: P, sink: S) -> Self {
        Self::with_shared(pool_size, Arc::new(processor), Arc::new(sink))
    }

    /// Build a dispatcher around a processor and sink the caller keeps a handle to.
    pub fn with_shared(pool_size: usize, processor: Arc<P>, sink: Arc<S>) -> Self {
        Self {
            pool_size,
            failure_policy: FailurePolicy::default(),
            processor,
            sink,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Process every item and return once all of them are done.
    ///
    /// A zero pool size fails before any event is emitted. Task failures do
    /// not make this return `Err`; they are recorded in the report.
    pub async fn run<I>(&self, items: I) -> Result<DispatchReport>
    where
        I: IntoIterator,
        I::Item: Into<WorkItem>,
    {
        if self.pool_size == 0 {
            return Err(DispatchError::InvalidPoolSize(self.pool_size));
        }

        let span = info_span!("dispatch", batch = %Uuid::new_v4(), pool_size = self.pool_size);
        self.run_batch(items).instrument(span).await
    }

    async fn run_batch<I>(&self, items: I) -> Result<DispatchReport>
    where
        I: IntoIterator,
        I::Item: Into<WorkItem>,
    {
        let started = Instant::now();
        let mut pool = WorkerPool::spawn(
            self.pool_size,
            Arc::clone(&self.processor),
            Arc::clone(&self.sink),
            self.failure_policy,
        )?;

        for item in items {
            pool.submit(item.into());
        }
        let records = pool.join().await;

        let report = DispatchReport {
            records,
            elapsed: started.elapsed(),
        };
        let failed = report.failures().count();
        info!(
            items = report.len(),
            completed = report.completed(),
            failed,
            skipped = report.skipped(),
            elapsed = ?report.elapsed,
            "batch finished"
        );

        emit_guarded(
            self.sink.as_ref(),
            ProgressEvent::BatchFinished {
                completed: report.completed(),
                failed,
                skipped: report.skipped(),
                elapsed: report.elapsed,
            },
        );

        Ok(report)
    }
}

/// Process `items` with a fixed `task_latency` per item on `pool_size`
/// slots, printing progress to stdout.
pub async fn dispatch<I>(
    items: I,
    pool_size: usize,
    task_latency: Duration,
) -> Result<DispatchReport>
where
    I: IntoIterator,
    I::Item: Into<WorkItem>,
{
    let processor = SleepProcessor::new(task_latency);
    Dispatcher::new(pool_size, processor, ConsoleSink::for_sleep(&processor))
        .run(items)
        .await
}
