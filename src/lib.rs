//! fanout library
//!
//! Distributes an ordered batch of string work items across a fixed-size
//! pool of concurrent worker slots and waits for all of them.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod progress;
pub mod work;

pub use config::{DispatchConfig, FailurePolicy};
pub use dispatch::{dispatch, DispatchReport, Dispatcher};
pub use error::{DispatchError, TaskFailure};
pub use pool::{ItemRecord, Outcome, WorkerPool};
pub use progress::{ConsoleSink, MemorySink, ProgressEvent, ProgressSink};
pub use work::{Processor, SleepProcessor, WorkItem};
