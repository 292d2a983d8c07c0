//! Background Tasks Module
//!
//! # Tasks
//! - TTL Cleanup: Removes expired entries from in-memory storage

mod cleanup;

pub use cleanup::spawn_cleanup_task;
