//! The published auth snapshot.

use crate::error::AuthError;
use crate::provider::AuthActions;
use crate::providers::AuthClient;
use crate::state::{AuthState, PhaseKind};
use serde::Serialize;
use session_core::environment::Clock;

/// What consumers see: login flag, user, and the actions to change them.
///
/// Two snapshots are equal when their data is equal and their actions belong
/// to the same provider, which is what the publisher uses to decide whether
/// subscribers need waking.
#[derive(Serialize)]
#[serde(bound(serialize = "C::User: Serialize"))]
pub struct AuthInfo<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    /// Whether a user is logged in.
    pub is_logged_in: bool,

    /// The logged-in user; present exactly when `is_logged_in`.
    pub current_user: Option<C::User>,

    /// Current phase, including in-flight transitions.
    pub phase: PhaseKind,

    /// Most recent client failure.
    pub last_error: Option<AuthError>,

    /// Login and logout for the provider that published this snapshot.
    #[serde(skip)]
    pub actions: AuthActions<C, K>,
}

impl<C, K> AuthInfo<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    /// Derive the snapshot for `state`.
    #[must_use]
    pub fn derive(state: &AuthState<C::User>, actions: &AuthActions<C, K>) -> Self {
        Self {
            is_logged_in: state.is_logged_in(),
            current_user: state.current_user().cloned(),
            phase: state.phase.kind(),
            last_error: state.last_error.clone(),
            actions: actions.clone(),
        }
    }
}

impl<C, K> Clone for AuthInfo<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            is_logged_in: self.is_logged_in,
            current_user: self.current_user.clone(),
            phase: self.phase,
            last_error: self.last_error.clone(),
            actions: self.actions.clone(),
        }
    }
}

impl<C, K> PartialEq for AuthInfo<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.is_logged_in == other.is_logged_in
            && self.current_user == other.current_user
            && self.phase == other.phase
            && self.last_error == other.last_error
            && self.actions == other.actions
    }
}

impl<C, K> std::fmt::Debug for AuthInfo<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo")
            .field("is_logged_in", &self.is_logged_in)
            .field("current_user", &self.current_user)
            .field("phase", &self.phase)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}
