//! Shared per-source runtime state
//!
//! # Components
//!
//! - `RateLimiter`: token bucket shared by every task of one source
//! - `ProgressCounters`: discovered/completed/error counters read by listeners
//! - `TaskStats`: fork count and recursion depth of a source's task trees

mod progress;
mod rate_limiter;

pub use progress::{ProgressCounters, ProgressSnapshot, TaskStats};
pub use rate_limiter::RateLimiter;
