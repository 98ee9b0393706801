//! External authentication client trait.

use crate::error::Result;
use std::fmt::Debug;

/// External authentication client.
///
/// This trait abstracts over the SDK that actually authenticates users.
/// It owns the network calls, session persistence and token lifecycle;
/// the provider only caches what it reports.
///
/// # Implementation Notes
///
/// - The synchronous queries are called once, when the provider is built
/// - The provider never runs two client calls at the same time
/// - Failures should be reported as [`AuthError::Client`](crate::AuthError::Client)
pub trait AuthClient: Clone + Send + Sync + 'static {
    /// Opaque user handle. Stored and forwarded, never inspected.
    type User: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Whether the client currently holds a logged-in user.
    fn has_logged_in_user(&self) -> bool;

    /// The client's current user, if any.
    fn current_user(&self) -> Option<Self::User>;

    /// Log in anonymously.
    ///
    /// # Errors
    ///
    /// Returns error if the client cannot create an anonymous session.
    fn login_anonymous(&self) -> impl std::future::Future<Output = Result<Self::User>> + Send;

    /// Log out the current user.
    ///
    /// # Errors
    ///
    /// Returns error if the client cannot end the session.
    fn logout_current_user(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
