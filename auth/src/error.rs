//! Error types for session authentication operations.

use crate::state::PhaseKind;
use serde::Serialize;
use session_runtime::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// The auth client operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientOperation {
    /// `login_anonymous`
    AnonymousLogin,
    /// `logout_current_user`
    Logout,
}

impl std::fmt::Display for ClientOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AnonymousLogin => write!(f, "anonymous login"),
            Self::Logout => write!(f, "logout"),
        }
    }
}

/// Error taxonomy for the auth provider and its actions.
///
/// Precondition no-ops are not errors; they surface as
/// [`Transition::Skipped`](crate::actions::Transition::Skipped).
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Client Errors
    // ═══════════════════════════════════════════════════════════

    /// The external auth client reported a failure.
    #[error("Auth client {operation} failed: {reason}")]
    Client {
        /// Operation that failed
        operation: ClientOperation,
        /// Reason reported by the client
        reason: String,
    },

    /// The external auth client did not answer in time.
    #[error("Auth client {operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out
        operation: ClientOperation,
        /// Configured client timeout
        after: Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // Transition Errors
    // ═══════════════════════════════════════════════════════════

    /// Another login or logout is still in flight.
    #[error("Cannot start a transition while {phase}")]
    TransitionInProgress {
        /// Phase the provider was in when the trigger arrived
        phase: PhaseKind,
    },

    // ═══════════════════════════════════════════════════════════
    // Usage Errors
    // ═══════════════════════════════════════════════════════════

    /// Accessor or action used while the provider is not mounted.
    #[error("Auth state used outside a mounted provider")]
    NotMounted,

    /// The provider behind a handle has been dropped.
    #[error("Auth provider is no longer available")]
    ProviderUnavailable,

    /// `start()` called on a mounted provider.
    #[error("Auth provider already started")]
    AlreadyStarted,

    /// `start()` called after `stop()`.
    #[error("Auth provider has been stopped")]
    Stopped,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// The underlying store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error (lock poisoning and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Build a client failure for `operation`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use session_auth::error::{AuthError, ClientOperation};
    /// let error = AuthError::client(ClientOperation::Logout, "network down");
    /// assert_eq!(error.to_string(), "Auth client logout failed: network down");
    /// ```
    pub fn client(operation: ClientOperation, reason: impl Into<String>) -> Self {
        Self::Client {
            operation,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the external client failed or timed out.
    ///
    /// # Examples
    ///
    /// ```
    /// # use session_auth::error::{AuthError, ClientOperation};
    /// assert!(AuthError::client(ClientOperation::AnonymousLogin, "boom").is_client_failure());
    /// assert!(!AuthError::NotMounted.is_client_failure());
    /// ```
    #[must_use]
    pub const fn is_client_failure(&self) -> bool {
        matches!(self, Self::Client { .. } | Self::Timeout { .. })
    }
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ShutdownInProgress => Self::NotMounted,
            other => Self::Store(other.to_string()),
        }
    }
}
