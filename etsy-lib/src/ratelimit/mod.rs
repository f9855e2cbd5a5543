//! Rate limiting and scheduling of outgoing requests.
//!
//! The API allows a limited number of requests per time window. Every request
//! of a [`Client`](crate::Client), including the initial method table fetch,
//! is queued in a [`Scheduler`], which dispatches requests in FIFO order and
//! never exceeds [`RateLimitConfig::max_clients`] dispatches per
//! [`RateLimitConfig::period`].
//!
//! # Architecture
//!
//! - [`RateLimitConfig`]: slot count and window length
//! - [`Scheduler`]: cloneable handle used to submit requests
//! - [`ResponseHandle`]: completion handle of one submitted request
//! - [`SchedulerSnapshot`]: read-only view of the dispatcher state

mod config;
mod scheduler;

pub use config::RateLimitConfig;
pub use scheduler::{ResponseHandle, Scheduler, SchedulerSnapshot};
