//! Fixed-size worker pool.
//!
//! A pool owns `size` slot tasks that pull jobs from one FIFO queue. Each
//! slot runs at most one item at a time, so every slot sees a subsequence of
//! the submission order. The pool lives for a single batch: `join` closes
//! the queue and waits for every slot before returning.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, Instrument, Span};

use crate::config::FailurePolicy;
use crate::error::{DispatchError, Result, TaskFailure};
use crate::progress::{emit_guarded, ProgressEvent, ProgressSink};
use crate::work::{Processor, WorkItem};

/// What happened to one submitted item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed(TaskFailure),
    /// Never started because an earlier failure aborted the batch.
    Skipped,
}

/// Per-item record returned by [`WorkerPool::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    /// Position in submission order.
    pub index: usize,
    pub item: WorkItem,
    /// Slot that ran the item; `None` for skipped items.
    pub slot: Option<usize>,
    pub outcome: Outcome,
}

struct Job {
    index: usize,
    item: WorkItem,
}

type JobQueue = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;

pub struct WorkerPool {
    size: usize,
    submitted: Vec<WorkItem>,
    sender: mpsc::UnboundedSender<Job>,
    slots: JoinSet<Vec<ItemRecord>>,
}

impl WorkerPool {
    /// Spawn `size` slots on the current tokio runtime.
    ///
    /// Fails with [`DispatchError::InvalidPoolSize`] when `size` is zero;
    /// nothing is spawned in that case.
    pub fn spawn<P, S>(
        size: usize,
        processor: Arc<P>,
        sink: Arc<S>,
        policy: FailurePolicy,
    ) -> Result<Self>
    where
        P: Processor,
        S: ProgressSink,
    {
        if size == 0 {
            return Err(DispatchError::InvalidPoolSize(size));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: JobQueue = Arc::new(Mutex::new(receiver));
        let abort = CancellationToken::new();

        let mut slots = JoinSet::new();
        for slot in 0..size {
            let worker = Slot {
                id: slot,
                queue: Arc::clone(&queue),
                processor: Arc::clone(&processor),
                sink: Arc::clone(&sink),
                policy,
                abort: abort.clone(),
            };
            slots.spawn(worker.run().instrument(Span::current()));
        }
        debug!(size, ?policy, "worker pool spawned");

        Ok(Self {
            size,
            submitted: Vec::new(),
            sender,
            slots,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue the next item. Items are numbered in the order they are submitted.
    pub fn submit(&mut self, item: WorkItem) {
        let index = self.submitted.len();
        self.submitted.push(item.clone());
        trace!(index, item = %item, "submitting item");
        // Slots only exit once the sender is dropped, so the receiver is alive here.
        if self.sender.send(Job { index, item }).is_err() {
            error!(index, "work queue closed before submission");
        }
    }

    /// Close the queue, wait for every slot and return all records in
    /// submission order.
    ///
    /// Always returns exactly one record per submitted item. Items whose slot
    /// died before handing back its records are reported as failed.
    pub async fn join(self) -> Vec<ItemRecord> {
        let WorkerPool {
            size,
            submitted,
            sender,
            mut slots,
        } = self;
        drop(sender);

        let mut records = Vec::with_capacity(submitted.len());
        while let Some(joined) = slots.join_next().await {
            match joined {
                Ok(slot_records) => records.extend(slot_records),
                Err(e) => error!(error = %e, "worker slot terminated abnormally"),
            }
        }
        let records = fill_missing(records, submitted);

        debug!(size, items = records.len(), "worker pool joined");
        records
    }
}

/// Sort `records` by index and add a failed record for every submitted
/// item that has none.
fn fill_missing(mut records: Vec<ItemRecord>, submitted: Vec<WorkItem>) -> Vec<ItemRecord> {
    records.sort_by_key(|record| record.index);
    if records.len() == submitted.len() {
        return records;
    }

    let mut filled = Vec::with_capacity(submitted.len());
    let mut existing = records.into_iter().peekable();
    for (index, item) in submitted.into_iter().enumerate() {
        match existing.next_if(|record| record.index == index) {
            Some(record) => filled.push(record),
            None => {
                error!(index, item = %item, "no record for item, marking failed");
                filled.push(ItemRecord {
                    index,
                    item: item.clone(),
                    slot: None,
                    outcome: Outcome::Failed(TaskFailure::new(item, "slot terminated")),
                });
            }
        }
    }
    filled
}

struct Slot<P, S> {
    id: usize,
    queue: JobQueue,
    processor: Arc<P>,
    sink: Arc<S>,
    policy: FailurePolicy,
    abort: CancellationToken,
}

impl<P: Processor, S: ProgressSink> Slot<P, S> {
    async fn run(self) -> Vec<ItemRecord> {
        debug!(slot = self.id, "slot started");
        let mut records = Vec::new();

        loop {
            // The lock is held only while taking the next job.
            let next = self.queue.lock().await.recv().await;
            let Some(Job { index, item }) = next else {
                break;
            };

            if self.abort.is_cancelled() {
                trace!(slot = self.id, index, "batch aborted, skipping item");
                emit_guarded(
                    self.sink.as_ref(),
                    ProgressEvent::Skipped {
                        index,
                        item: item.clone(),
                    },
                );
                records.push(ItemRecord {
                    index,
                    item,
                    slot: None,
                    outcome: Outcome::Skipped,
                });
                continue;
            }

            records.push(self.execute(index, item).await);
        }

        debug!(slot = self.id, processed = records.len(), "slot finished");
        records
    }

    async fn execute(&self, index: usize, item: WorkItem) -> ItemRecord {
        emit_guarded(
            self.sink.as_ref(),
            ProgressEvent::Started {
                index,
                slot: self.id,
                item: item.clone(),
            },
        );
        let started = Instant::now();

        let result = AssertUnwindSafe(self.processor.process(&item))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(TaskFailure::new(
                    item.clone(),
                    format!("panicked: {}", panic_message(payload.as_ref())),
                ))
            });

        let outcome = match result {
            Ok(()) => {
                let elapsed = started.elapsed();
                trace!(slot = self.id, index, ?elapsed, "item finished");
                emit_guarded(
                    self.sink.as_ref(),
                    ProgressEvent::Finished {
                        index,
                        slot: self.id,
                        item: item.clone(),
                        elapsed,
                    },
                );
                Outcome::Completed
            }
            Err(failure) => {
                debug!(slot = self.id, index, reason = %failure.reason, "item failed");
                emit_guarded(
                    self.sink.as_ref(),
                    ProgressEvent::Failed {
                        index,
                        slot: self.id,
                        item: item.clone(),
                        reason: failure.reason.clone(),
                    },
                );
                if self.policy == FailurePolicy::FailFast {
                    self.abort.cancel();
                }
                Outcome::Failed(failure)
            }
        };

        ItemRecord {
            index,
            item,
            slot: Some(self.id),
            outcome,
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
