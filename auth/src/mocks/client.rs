//! Mock auth client for testing.

use crate::error::{AuthError, ClientOperation, Result};
use crate::providers::AuthClient;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// User handle issued by [`MockAuthClient`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MockUser {
    /// User id.
    pub id: String,
}

impl MockUser {
    /// Create a user with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Default)]
struct MockClientState {
    current_user: Option<MockUser>,
    next_users: VecDeque<MockUser>,
    login_failures: VecDeque<String>,
    logout_failures: VecDeque<String>,
    login_calls: usize,
    logout_calls: usize,
    issued: u64,
    latency: Duration,
}

/// Mock auth client.
///
/// Uses in-memory storage. Logins return queued users first, then
/// `anon-1`, `anon-2`, ... Failures and latency are scriptable, and every
/// call is counted.
///
/// # Examples
///
/// ```
/// use session_auth::mocks::{MockAuthClient, MockUser};
/// use session_auth::providers::AuthClient;
///
/// let client = MockAuthClient::new().with_logged_in_user(MockUser::new("u1"));
/// assert!(client.has_logged_in_user());
/// assert_eq!(client.current_user(), Some(MockUser::new("u1")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockAuthClient {
    state: Arc<Mutex<MockClientState>>,
}

impl MockAuthClient {
    /// Create a mock client with no logged-in user.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `user` already logged in.
    #[must_use]
    pub fn with_logged_in_user(self, user: MockUser) -> Self {
        self.update(|state| state.current_user = Some(user));
        self
    }

    /// Queue `user` as the result of the next successful login.
    #[must_use]
    pub fn with_next_user(self, user: MockUser) -> Self {
        self.update(|state| state.next_users.push_back(user));
        self
    }

    /// Delay every client call by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.update(|state| state.latency = latency);
        self
    }

    /// Make the next login fail with `reason`.
    pub fn fail_next_login(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.update(|state| state.login_failures.push_back(reason));
    }

    /// Make the next logout fail with `reason`.
    pub fn fail_next_logout(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.update(|state| state.logout_failures.push_back(reason));
    }

    /// Number of `login_anonymous` calls so far.
    #[must_use]
    pub fn login_calls(&self) -> usize {
        self.read(|state| state.login_calls)
    }

    /// Number of `logout_current_user` calls so far.
    #[must_use]
    pub fn logout_calls(&self) -> usize {
        self.read(|state| state.logout_calls)
    }

    fn update(&self, f: impl FnOnce(&mut MockClientState)) {
        if let Ok(mut state) = lock(&self.state) {
            f(&mut state);
        }
    }

    fn read<T: Default>(&self, f: impl FnOnce(&MockClientState) -> T) -> T {
        lock(&self.state).map(|state| f(&state)).unwrap_or_default()
    }
}

fn lock(state: &Mutex<MockClientState>) -> Result<MutexGuard<'_, MockClientState>> {
    state
        .lock()
        .map_err(|_| AuthError::Internal("Mutex lock failed".to_string()))
}

impl AuthClient for MockAuthClient {
    type User = MockUser;

    fn has_logged_in_user(&self) -> bool {
        self.read(|state| state.current_user.is_some())
    }

    fn current_user(&self) -> Option<MockUser> {
        self.read(|state| state.current_user.clone())
    }

    fn login_anonymous(&self) -> impl Future<Output = Result<MockUser>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let latency = {
                let mut guard = lock(&state)?;
                guard.login_calls += 1;
                guard.latency
            };
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let mut guard = lock(&state)?;
            if let Some(reason) = guard.login_failures.pop_front() {
                return Err(AuthError::client(ClientOperation::AnonymousLogin, reason));
            }

            let user = match guard.next_users.pop_front() {
                Some(user) => user,
                None => {
                    guard.issued += 1;
                    MockUser::new(format!("anon-{}", guard.issued))
                },
            };
            guard.current_user = Some(user.clone());
            Ok(user)
        }
    }

    fn logout_current_user(&self) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let latency = {
                let mut guard = lock(&state)?;
                guard.logout_calls += 1;
                guard.latency
            };
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let mut guard = lock(&state)?;
            if let Some(reason) = guard.logout_failures.pop_front() {
                return Err(AuthError::client(ClientOperation::Logout, reason));
            }

            guard.current_user = None;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn issues_queued_then_generated_users() {
        let client = MockAuthClient::new().with_next_user(MockUser::new("u1"));

        assert_eq!(client.login_anonymous().await.unwrap(), MockUser::new("u1"));
        assert_eq!(client.login_anonymous().await.unwrap(), MockUser::new("anon-1"));
        assert_eq!(client.login_calls(), 2);
        assert_eq!(client.current_user(), Some(MockUser::new("anon-1")));
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_once() {
        let client = MockAuthClient::new().with_logged_in_user(MockUser::new("u1"));
        client.fail_next_logout("offline");

        let error = client.logout_current_user().await.unwrap_err();
        assert_eq!(error, AuthError::client(ClientOperation::Logout, "offline"));
        assert!(client.has_logged_in_user());

        client.logout_current_user().await.unwrap();
        assert!(!client.has_logged_in_user());
        assert_eq!(client.logout_calls(), 2);
    }

    #[tokio::test]
    async fn failed_login_leaves_no_user() {
        let client = MockAuthClient::new();
        client.fail_next_login("denied");

        assert!(client.login_anonymous().await.is_err());
        assert_eq!(client.current_user(), None);
    }
}
