pub mod error;
pub mod metrics;
pub mod retry;
pub mod state;

pub use error::{EngineError, StateError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use retry::{RetryDisposition, RetryError, RetryPolicy};
pub use state::{Checkpoint, CheckpointStore, ProgressStore, SqlCheckpointStore, SqlProgressStore};
