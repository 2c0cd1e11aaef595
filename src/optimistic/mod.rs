//! Optimistic local-first execution with single-flight identity tracking.

/// Executor, operation construction, and pending bookkeeping.
pub mod executor;
