// src/pipeline/mod.rs

pub mod fields;
pub mod progress;
pub mod queue;
pub mod readers;
pub mod retry;
pub mod sequencer;
pub mod writers;

pub use fields::{FieldGroup, FieldLookup};
pub use progress::ProgressReporter;
pub use queue::WorkQueue;
pub use retry::{BackoffEvent, RetryConfig, RetryPolicy};
pub use sequencer::{OutputOrder, OutputSequencer};
