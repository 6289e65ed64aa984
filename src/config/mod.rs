//! Worker and supervisor configuration types.

pub mod types;

pub use types::{SupervisorConfig, WorkerConfig};
