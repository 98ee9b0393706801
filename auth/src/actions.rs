//! Authentication actions.
//!
//! Commands carry the caller's intent; events report what the client did.
//! Every event carries the [`RequestId`] of the command it answers.

use crate::error::{AuthError, Result};
use crate::state::RequestId;
use serde::Serialize;

/// Authentication action.
///
/// # Architecture Note
///
/// Actions are the **only** way to change the auth state.
/// The reducer is a pure function: `(State, Action, Env) → (State, Effects)`.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthAction<U> {
    // ═══════════════════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════════════════
    /// Log in anonymously if no user is logged in.
    LoginAnonymously {
        /// Correlation id for the outcome.
        request_id: RequestId,
    },

    /// Log the current user out if one is logged in.
    Logout {
        /// Correlation id for the outcome.
        request_id: RequestId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Events
    // ═══════════════════════════════════════════════════════════════════════
    /// The client logged a user in.
    LoginSucceeded {
        /// Request being answered.
        request_id: RequestId,
        /// User returned by the client.
        user: U,
    },

    /// The client failed to log a user in.
    LoginFailed {
        /// Request being answered.
        request_id: RequestId,
        /// Client failure.
        error: AuthError,
    },

    /// The client logged the current user out.
    LogoutSucceeded {
        /// Request being answered.
        request_id: RequestId,
    },

    /// The client failed to log the current user out.
    LogoutFailed {
        /// Request being answered.
        request_id: RequestId,
        /// Client failure.
        error: AuthError,
    },

    /// The command's precondition did not hold; nothing was done.
    TransitionSkipped {
        /// Request being answered.
        request_id: RequestId,
        /// Which precondition failed.
        reason: SkipReason,
    },

    /// The command arrived while another transition was in flight.
    TransitionRejected {
        /// Request being answered.
        request_id: RequestId,
        /// Always [`AuthError::TransitionInProgress`].
        error: AuthError,
    },
}

impl<U> AuthAction<U> {
    /// The correlation id carried by this action.
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::LoginAnonymously { request_id }
            | Self::Logout { request_id }
            | Self::LoginSucceeded { request_id, .. }
            | Self::LoginFailed { request_id, .. }
            | Self::LogoutSucceeded { request_id }
            | Self::LogoutFailed { request_id, .. }
            | Self::TransitionSkipped { request_id, .. }
            | Self::TransitionRejected { request_id, .. } => *request_id,
        }
    }

    /// Whether this action is a command (as opposed to an outcome event).
    pub const fn is_command(&self) -> bool {
        matches!(self, Self::LoginAnonymously { .. } | Self::Logout { .. })
    }

    /// Whether this action is the outcome of the command sent with `request_id`.
    pub fn is_outcome_of(&self, request_id: RequestId) -> bool {
        !self.is_command() && self.request_id() == request_id
    }

    /// Convert an outcome event into the caller-facing result.
    ///
    /// # Errors
    ///
    /// Returns the carried error for failed or rejected transitions, and
    /// [`AuthError::Internal`] when called on a command.
    pub fn into_transition(self) -> Result<Transition> {
        match self {
            Self::LoginSucceeded { .. } | Self::LogoutSucceeded { .. } => Ok(Transition::Completed),
            Self::TransitionSkipped { reason, .. } => Ok(Transition::Skipped(reason)),
            Self::LoginFailed { error, .. }
            | Self::LogoutFailed { error, .. }
            | Self::TransitionRejected { error, .. } => Err(error),
            Self::LoginAnonymously { .. } | Self::Logout { .. } => Err(AuthError::Internal(
                "a command is not an outcome".to_string(),
            )),
        }
    }
}

/// Why a command was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `LoginAnonymously` while a user is logged in.
    AlreadyLoggedIn,
    /// `Logout` while no user is logged in.
    NotLoggedIn,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyLoggedIn => write!(f, "a user is already logged in"),
            Self::NotLoggedIn => write!(f, "no user is logged in"),
        }
    }
}

/// Successful outcome of a login or logout action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The client call succeeded and the state changed.
    Completed,
    /// The precondition did not hold; the client was not called.
    Skipped(SkipReason),
}
