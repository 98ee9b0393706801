//! Authentication state types.
//!
//! The state is a small state machine. Whether a user is present is encoded
//! in the phase itself, so "logged in" and "has a user" cannot disagree.

use crate::error::AuthError;
use crate::providers::AuthClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Correlation id pairing a login/logout command with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    /// Generate a new random `RequestId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Phases
// ═══════════════════════════════════════════════════════════════════════

/// Login phase with its associated data.
///
/// ```text
/// LoggedOut  ──login──▶  LoggingIn  ──ok──▶  LoggedIn
///     ▲                     │ err               │
///     └─────────────────────┘                logout
///     ▲                                         ▼
///     └────────────ok─────────────────────  LoggingOut ──err──▶ LoggedIn
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum AuthPhase<U> {
    /// No user is logged in.
    LoggedOut,

    /// An anonymous login is in flight.
    LoggingIn {
        /// Request that started the login.
        request_id: RequestId,
    },

    /// A user is logged in.
    LoggedIn {
        /// The client's user handle.
        user: U,
    },

    /// A logout is in flight; the user stays logged in until it succeeds.
    LoggingOut {
        /// Request that started the logout.
        request_id: RequestId,
        /// The user being logged out.
        user: U,
    },
}

impl<U> AuthPhase<U> {
    /// Whether a user is logged in. True while a logout is still in flight.
    pub const fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn { .. } | Self::LoggingOut { .. })
    }

    /// The logged-in user, present exactly when [`is_logged_in`](Self::is_logged_in).
    pub const fn current_user(&self) -> Option<&U> {
        match self {
            Self::LoggedIn { user } | Self::LoggingOut { user, .. } => Some(user),
            Self::LoggedOut | Self::LoggingIn { .. } => None,
        }
    }

    /// The request id of the in-flight transition, if any.
    pub const fn pending_request(&self) -> Option<RequestId> {
        match self {
            Self::LoggingIn { request_id } | Self::LoggingOut { request_id, .. } => {
                Some(*request_id)
            },
            Self::LoggedOut | Self::LoggedIn { .. } => None,
        }
    }

    /// Whether a login or logout is in flight.
    pub const fn is_transitioning(&self) -> bool {
        self.pending_request().is_some()
    }

    /// The data-free discriminant of this phase.
    pub const fn kind(&self) -> PhaseKind {
        match self {
            Self::LoggedOut => PhaseKind::LoggedOut,
            Self::LoggingIn { .. } => PhaseKind::LoggingIn,
            Self::LoggedIn { .. } => PhaseKind::LoggedIn,
            Self::LoggingOut { .. } => PhaseKind::LoggingOut,
        }
    }
}

/// Data-free view of an [`AuthPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// No user is logged in.
    LoggedOut,
    /// An anonymous login is in flight.
    LoggingIn,
    /// A user is logged in.
    LoggedIn,
    /// A logout is in flight.
    LoggingOut,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::LoggingIn => write!(f, "logging in"),
            Self::LoggedIn => write!(f, "logged in"),
            Self::LoggingOut => write!(f, "logging out"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Root State
// ═══════════════════════════════════════════════════════════════════════

/// Root authentication state, owned by the provider's store.
///
/// # Examples
///
/// ```
/// use session_auth::AuthState;
///
/// let state = AuthState::logged_in("u1");
/// assert!(state.is_logged_in());
/// assert_eq!(state.current_user(), Some(&"u1"));
///
/// let state = AuthState::<&str>::logged_out();
/// assert!(state.current_user().is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState<U> {
    /// Current phase.
    pub phase: AuthPhase<U>,

    /// Most recent client failure; cleared by the next successful transition.
    pub last_error: Option<AuthError>,

    /// When the phase last changed (from the injected clock).
    pub changed_at: Option<DateTime<Utc>>,
}

impl<U> AuthState<U> {
    /// State with no user logged in.
    #[must_use]
    pub const fn logged_out() -> Self {
        Self {
            phase: AuthPhase::LoggedOut,
            last_error: None,
            changed_at: None,
        }
    }

    /// State with `user` logged in.
    #[must_use]
    pub const fn logged_in(user: U) -> Self {
        Self {
            phase: AuthPhase::LoggedIn { user },
            last_error: None,
            changed_at: None,
        }
    }

    /// Seed the state from the client's synchronous queries.
    ///
    /// If the client claims a logged-in user but returns none, the state
    /// starts logged out.
    pub fn from_client<C>(client: &C) -> Self
    where
        C: AuthClient<User = U>,
    {
        let has_user = client.has_logged_in_user();
        match (has_user, client.current_user()) {
            (true, Some(user)) => Self::logged_in(user),
            (true, None) => {
                tracing::warn!("Auth client reports a logged-in user but returned none");
                Self::logged_out()
            },
            (false, Some(_)) => {
                tracing::warn!("Auth client returned a user while reporting none logged in");
                Self::logged_out()
            },
            (false, None) => Self::logged_out(),
        }
    }

    /// Whether a user is logged in.
    pub const fn is_logged_in(&self) -> bool {
        self.phase.is_logged_in()
    }

    /// The logged-in user, if any.
    pub const fn current_user(&self) -> Option<&U> {
        self.phase.current_user()
    }

    /// Replace the phase, stamping `changed_at` when its kind changes.
    pub fn transition_to(&mut self, phase: AuthPhase<U>, now: DateTime<Utc>) {
        if self.phase.kind() != phase.kind() {
            self.changed_at = Some(now);
        }
        self.phase = phase;
    }
}

impl<U> Default for AuthState<U> {
    fn default() -> Self {
        Self::logged_out()
    }
}
