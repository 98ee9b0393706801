//! # Session Testing
//!
//! Testing utilities and helpers for the session workspace.
//!
//! This crate provides:
//! - Mock implementations of core Environment traits
//! - A Given-When-Then builder for reducers
//! - Assertion helpers for effects, and a way to resolve them
//!
//! ## Example
//!
//! ```ignore
//! use session_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(AuthReducer::default())
//!     .with_env(test_environment())
//!     .given_state(AuthState::logged_out())
//!     .when_action(AuthAction::LoginAnonymously { request_id })
//!     .then_state(|state| assert!(state.phase.is_transitioning()))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use session_core::environment::Clock;


/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use session_testing::mocks::FixedClock;
    /// use session_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Tracing setup for tests.
pub mod helpers {
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Install a test-writer `tracing` subscriber, once per process
    ///
    /// Honors `RUST_LOG`; silent by default. Safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
            )
            .with_test_writer()
            .try_init();
    }

    /// Run `f` with a subscriber that records events at `level` and above
    ///
    /// Returns the formatted events, one per line, without timestamps or
    /// colors. The subscriber is the thread default only while `f` runs, so
    /// only work done synchronously on this thread is captured.
    ///
    /// # Example
    ///
    /// ```
    /// use session_testing::capture_logs;
    ///
    /// let logs = capture_logs(tracing::Level::INFO, || {
    ///     tracing::info!("visible");
    ///     tracing::debug!("filtered");
    /// });
    /// assert!(logs.contains("visible"));
    /// assert!(!logs.contains("filtered"));
    /// ```
    pub fn capture_logs<F: FnOnce()>(level: tracing::Level, f: F) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);
        buffer.contents()
    }

    /// Shared in-memory sink for [`capture_logs`].
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            self.0
                .lock()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut bytes) = self.0.lock() {
                bytes.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

// Re-export commonly used items
pub use helpers::{capture_logs, init_test_tracing};
pub use mocks::{test_clock, FixedClock};
pub use reducer_test::{assertions, resolve_effect, resolve_effects, resolve_only, ReducerTest};
