use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of requests allowed per period
const DEFAULT_MAX_CLIENTS: usize = 5;

/// Default length of the rate limiting window
const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Rate limiting configuration of a [`Scheduler`](crate::ratelimit::Scheduler).
///
/// At most `max_clients` requests are dispatched per rolling `period`, which
/// also bounds the number of requests in flight at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Number of dispatch slots
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Time after a dispatch until its slot becomes available again
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            period: default_period(),
        }
    }
}

/// Default number of requests allowed per period
const fn default_max_clients() -> usize {
    DEFAULT_MAX_CLIENTS
}

/// Default length of the rate limiting window
const fn default_period() -> Duration {
    DEFAULT_PERIOD
}

impl RateLimitConfig {
    /// Create a `RateLimitConfig`, using defaults for missing values.
    /// See [`RateLimitConfig::effective`] for the handling of zero.
    #[must_use]
    pub fn from_options(max_clients: Option<usize>, period: Option<Duration>) -> Self {
        Self {
            max_clients: max_clients.unwrap_or(DEFAULT_MAX_CLIENTS),
            period: period.unwrap_or(DEFAULT_PERIOD),
        }
        .effective()
    }

    /// The configuration a scheduler actually runs with.
    /// A `max_clients` of zero would never dispatch and is raised to one.
    #[must_use]
    pub fn effective(self) -> Self {
        if self.max_clients == 0 {
            log::warn!("Rate limit max_clients is 0, using 1");
            return Self {
                max_clients: 1,
                ..self
            };
        }
        self
    }
}
