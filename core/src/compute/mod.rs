//! Worker dispatch and cancellation primitives.
//!
//! This module provides the building blocks for running bake jobs off the
//! control thread:
//!
//! - [`CancellationToken`] / [`Cancelled`] - One-way, idempotent cancellation flag
//! - [`WorkerSource`] - Trait for the supplied worker-thread resource
//! - [`WorkerThreads`] - Persistent worker threads handed out round-robin
//! - [`InlineWorker`] - Runs dispatched work on the calling thread

mod cancellation;
mod worker;

pub use cancellation::{CancellationToken, Cancelled};
pub use worker::{InlineWorker, Work, WorkerSource, WorkerThreads};
