//! Worker pool consuming task envelopes and driving the execution engine

mod config;
mod pool;

pub use config::{parse_duration, WorkerConfig};
pub use pool::WorkerPool;
