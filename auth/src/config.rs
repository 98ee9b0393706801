//! Authentication provider configuration.
//!
//! Values should be provided by the application, not hardcoded. Durations
//! are read and written as whole milliseconds.

use serde::{Deserialize, Serialize};
use session_runtime::StoreConfig;
use std::time::Duration;

/// Auth provider configuration.
///
/// # Examples
///
/// ```
/// use session_auth::AuthConfig;
/// use std::time::Duration;
///
/// let config = AuthConfig::new()
///     .with_client_timeout(Duration::from_secs(5))
///     .with_response_grace(Duration::from_millis(250));
/// assert_eq!(config.response_timeout(), Duration::from_millis(5_250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Upper bound on a single auth client call.
    ///
    /// Default: 30 seconds
    #[serde(rename = "client_timeout_ms", with = "duration_ms")]
    pub client_timeout: Duration,

    /// Extra time a caller waits for an outcome beyond `client_timeout`.
    ///
    /// Default: 1 second
    #[serde(rename = "response_grace_ms", with = "duration_ms")]
    pub response_grace: Duration,

    /// How long `stop()` waits for in-flight client calls.
    ///
    /// Default: 5 seconds
    #[serde(rename = "shutdown_timeout_ms", with = "duration_ms")]
    pub shutdown_timeout: Duration,

    /// Number of outcome events buffered for waiting callers.
    ///
    /// Default: 16
    pub broadcast_capacity: usize,
}

impl AuthConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            client_timeout: Duration::from_secs(30),
            response_grace: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
            broadcast_capacity: 16,
        }
    }

    /// Set the client call timeout.
    #[must_use]
    pub const fn with_client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = timeout;
        self
    }

    /// Set the response grace period.
    #[must_use]
    pub const fn with_response_grace(mut self, grace: Duration) -> Self {
        self.response_grace = grace;
        self
    }

    /// Set the shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the outcome broadcast capacity.
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// How long a caller waits for the outcome of an action.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        self.client_timeout.saturating_add(self.response_grace)
    }

    /// Store configuration derived from this configuration.
    #[must_use]
    pub const fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.broadcast_capacity, self.shutdown_timeout)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
