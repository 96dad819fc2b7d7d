//! Infrastructure - cold path only
//!
//! This module contains non-latency-critical code:
//! - Configuration management
//! - Logging setup
//! - Connection slot allocator
//! - Worker thread pool

pub mod config;
pub mod logging;
pub mod pool;
pub mod thread_pool;

pub use pool::{SlotPool, SlotToken};
pub use thread_pool::WorkerPool;
