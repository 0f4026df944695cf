//! Utility modules for mdp-pipeline

pub mod atomic_write;
pub mod retry;

pub use atomic_write::write_atomic;
pub use retry::{retry_with_backoff, BackoffPolicy};
