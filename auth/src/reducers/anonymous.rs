//! Anonymous login / logout reducer.
//!
//! # Flow
//!
//! 1. `LoginAnonymously` while logged out moves to `LoggingIn` and calls the client
//! 2. The client's answer comes back as `LoginSucceeded` or `LoginFailed`
//! 3. `Logout` while logged in moves to `LoggingOut` and calls the client
//! 4. The client's answer comes back as `LogoutSucceeded` or `LogoutFailed`
//!
//! The precondition check and the move into the transitional phase happen in
//! one reduce call, under the store's write lock, so two concurrent triggers
//! can never both reach the client. The loser gets `TransitionRejected`.
//!
//! Commands that are no-ops answer with `TransitionSkipped`. Every command
//! therefore produces exactly one outcome event carrying its request id.

use crate::actions::{AuthAction, SkipReason};
use crate::config::AuthConfig;
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, ClientOperation, Result};
use crate::providers::AuthClient;
use crate::state::{AuthPhase, AuthState, RequestId};
use futures::FutureExt;
use session_core::effect::Effect;
use session_core::environment::Clock;
use session_core::reducer::Reducer;
use session_core::{smallvec, SmallVec};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Anonymous login / logout reducer.
#[derive(Debug, Clone)]
pub struct AuthReducer<C, K> {
    /// Upper bound on each client call.
    client_timeout: Duration,
    /// Phantom data to hold type parameters.
    _phantom: std::marker::PhantomData<fn() -> (C, K)>,
}

impl<C, K> AuthReducer<C, K> {
    /// Create a reducer with the default client timeout (30 seconds).
    #[must_use]
    pub const fn new() -> Self {
        Self::with_client_timeout(Duration::from_secs(30))
    }

    /// Create a reducer with a custom client timeout.
    #[must_use]
    pub const fn with_client_timeout(client_timeout: Duration) -> Self {
        Self {
            client_timeout,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Create a reducer from provider configuration.
    #[must_use]
    pub const fn from_config(config: &AuthConfig) -> Self {
        Self::with_client_timeout(config.client_timeout)
    }
}

impl<C, K> Default for AuthReducer<C, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, K> AuthReducer<C, K>
where
    C: AuthClient,
    K: Clock + Clone,
{
    fn login_effect(&self, client: C, request_id: RequestId) -> Effect<AuthAction<C::User>> {
        let timeout = self.client_timeout;

        Effect::future(async move {
            let outcome = guarded_call(ClientOperation::AnonymousLogin, timeout, || {
                client.login_anonymous()
            })
            .await;

            Some(match outcome {
                Ok(user) => AuthAction::LoginSucceeded { request_id, user },
                Err(error) => AuthAction::LoginFailed { request_id, error },
            })
        })
    }

    fn logout_effect(&self, client: C, request_id: RequestId) -> Effect<AuthAction<C::User>> {
        let timeout = self.client_timeout;

        Effect::future(async move {
            let outcome = guarded_call(ClientOperation::Logout, timeout, || {
                client.logout_current_user()
            })
            .await;

            Some(match outcome {
                Ok(()) => AuthAction::LogoutSucceeded { request_id },
                Err(error) => AuthAction::LogoutFailed { request_id, error },
            })
        })
    }

    fn reject(
        state: &AuthState<C::User>,
        request_id: RequestId,
        operation: &'static str,
    ) -> SmallVec<[Effect<AuthAction<C::User>>; 4]> {
        let phase = state.phase.kind();
        tracing::warn!(%request_id, %phase, operation, "Rejected: transition already in flight");
        metrics::counter!("auth.transition.rejected", "operation" => operation).increment(1);

        smallvec![Effect::send(AuthAction::TransitionRejected {
            request_id,
            error: AuthError::TransitionInProgress { phase },
        })]
    }
}

/// Run one client call, bounded by `timeout`.
///
/// A call that panics is reported as [`AuthError::Internal`] so the pending
/// transition still settles.
async fn guarded_call<T, F, Fut>(operation: ClientOperation, timeout: Duration, call: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let bounded = AssertUnwindSafe(async move { tokio::time::timeout(timeout, call()).await });

    match bounded.catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(_elapsed)) => Err(AuthError::Timeout { operation, after: timeout }),
        Err(_panic) => {
            tracing::error!(%operation, "Auth client panicked");
            metrics::counter!("auth.client.panicked").increment(1);
            Err(AuthError::Internal(format!("auth client panicked during {operation}")))
        },
    }
}

const fn failure_cause(error: &AuthError) -> &'static str {
    if error.is_client_failure() { "client" } else { "internal" }
}

impl<C, K> Reducer for AuthReducer<C, K>
where
    C: AuthClient,
    K: Clock + Clone,
{
    type State = AuthState<C::User>;
    type Action = AuthAction<C::User>;
    type Environment = AuthEnvironment<C, K>;

    #[allow(clippy::too_many_lines)] // one arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // LoginAnonymously: only from LoggedOut
            // ═══════════════════════════════════════════════════════════════
            AuthAction::LoginAnonymously { request_id } => match state.phase {
                AuthPhase::LoggedOut => {
                    tracing::debug!(%request_id, "Starting anonymous login");
                    metrics::counter!("auth.login.attempts").increment(1);

                    state.transition_to(AuthPhase::LoggingIn { request_id }, env.clock.now());
                    smallvec![self.login_effect(env.client.clone(), request_id)]
                },
                AuthPhase::LoggedIn { .. } => {
                    tracing::debug!(%request_id, "Anonymous login skipped: already logged in");
                    metrics::counter!("auth.login.skipped").increment(1);

                    smallvec![Effect::send(AuthAction::TransitionSkipped {
                        request_id,
                        reason: SkipReason::AlreadyLoggedIn,
                    })]
                },
                AuthPhase::LoggingIn { .. } | AuthPhase::LoggingOut { .. } => {
                    Self::reject(state, request_id, "login")
                },
            },

            // ═══════════════════════════════════════════════════════════════
            // Logout: only from LoggedIn
            // ═══════════════════════════════════════════════════════════════
            AuthAction::Logout { request_id } => match &state.phase {
                AuthPhase::LoggedIn { user } => {
                    tracing::debug!(%request_id, "Starting logout");
                    metrics::counter!("auth.logout.attempts").increment(1);

                    let user = user.clone();
                    state.transition_to(
                        AuthPhase::LoggingOut { request_id, user },
                        env.clock.now(),
                    );
                    smallvec![self.logout_effect(env.client.clone(), request_id)]
                },
                AuthPhase::LoggedOut => {
                    tracing::info!(%request_id, "Can't log out when no user is logged in");
                    metrics::counter!("auth.logout.skipped").increment(1);

                    smallvec![Effect::send(AuthAction::TransitionSkipped {
                        request_id,
                        reason: SkipReason::NotLoggedIn,
                    })]
                },
                AuthPhase::LoggingIn { .. } | AuthPhase::LoggingOut { .. } => {
                    Self::reject(state, request_id, "logout")
                },
            },

            // ═══════════════════════════════════════════════════════════════
            // Login outcomes
            // ═══════════════════════════════════════════════════════════════
            AuthAction::LoginSucceeded { request_id, user } => {
                if !matches!(state.phase, AuthPhase::LoggingIn { request_id: pending } if pending == request_id)
                {
                    tracing::warn!(%request_id, "Ignoring stale login result");
                    return smallvec![Effect::None];
                }

                tracing::info!(%request_id, ?user, "Anonymous login succeeded");
                metrics::counter!("auth.login.succeeded").increment(1);

                state.transition_to(AuthPhase::LoggedIn { user }, env.clock.now());
                state.last_error = None;
                smallvec![Effect::None]
            },

            AuthAction::LoginFailed { request_id, error } => {
                if !matches!(state.phase, AuthPhase::LoggingIn { request_id: pending } if pending == request_id)
                {
                    tracing::warn!(%request_id, "Ignoring stale login failure");
                    return smallvec![Effect::None];
                }

                tracing::error!(%request_id, %error, "Anonymous login failed");
                metrics::counter!("auth.login.failed", "cause" => failure_cause(&error)).increment(1);

                state.transition_to(AuthPhase::LoggedOut, env.clock.now());
                state.last_error = Some(error);
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Logout outcomes
            // ═══════════════════════════════════════════════════════════════
            AuthAction::LogoutSucceeded { request_id } => {
                if !matches!(state.phase, AuthPhase::LoggingOut { request_id: pending, .. } if pending == request_id)
                {
                    tracing::warn!(%request_id, "Ignoring stale logout result");
                    return smallvec![Effect::None];
                }

                tracing::info!(%request_id, "Logout succeeded");
                metrics::counter!("auth.logout.succeeded").increment(1);

                state.transition_to(AuthPhase::LoggedOut, env.clock.now());
                state.last_error = None;
                smallvec![Effect::None]
            },

            AuthAction::LogoutFailed { request_id, error } => {
                let phase = std::mem::replace(&mut state.phase, AuthPhase::LoggedOut);
                let user = match phase {
                    AuthPhase::LoggingOut {
                        request_id: pending,
                        user,
                    } if pending == request_id => user,
                    other => {
                        state.phase = other;
                        tracing::warn!(%request_id, "Ignoring stale logout failure");
                        return smallvec![Effect::None];
                    },
                };

                tracing::error!(%request_id, %error, "Logout failed");
                metrics::counter!("auth.logout.failed", "cause" => failure_cause(&error)).increment(1);

                state.transition_to(AuthPhase::LoggedIn { user }, env.clock.now());
                state.last_error = Some(error);
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Answers to callers; nothing to change
            // ═══════════════════════════════════════════════════════════════
            AuthAction::TransitionSkipped { .. } | AuthAction::TransitionRejected { .. } => {
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::mocks::{MockAuthClient, MockUser};
    use crate::state::PhaseKind;
    use session_core::environment::Clock;
    use session_testing::{
        assertions, capture_logs, resolve_only, test_clock, FixedClock, ReducerTest,
    };

    type TestReducer = AuthReducer<MockAuthClient, FixedClock>;

    fn env(client: MockAuthClient) -> AuthEnvironment<MockAuthClient, FixedClock> {
        AuthEnvironment::new(client, test_clock())
    }

    fn u1() -> MockUser {
        MockUser::new("u1")
    }

    fn explode<T>() -> T {
        panic!("auth sdk exploded");
    }

    #[test]
    fn login_from_logged_out_enters_logging_in() {
        let request_id = RequestId::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthClient::new()))
            .given_state(AuthState::logged_out())
            .when_action(AuthAction::LoginAnonymously { request_id })
            .then_state(move |state| {
                assert_eq!(state.phase, AuthPhase::LoggingIn { request_id });
                assert!(!state.is_logged_in());
                assert_eq!(state.changed_at, Some(test_clock().now()));
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[tokio::test]
    async fn login_effect_calls_client_once() {
        let client = MockAuthClient::new().with_next_user(u1());
        let request_id = RequestId::new();

        let effects = ReducerTest::new(TestReducer::new())
            .with_env(env(client.clone()))
            .given_state(AuthState::logged_out())
            .when_action(AuthAction::LoginAnonymously { request_id })
            .run();

        let outcome = resolve_only(effects).await;
        assert_eq!(outcome, AuthAction::LoginSucceeded { request_id, user: u1() });
        assert_eq!(client.login_calls(), 1);
    }

    #[tokio::test]
    async fn login_when_logged_in_is_skipped_without_client_call() {
        let client = MockAuthClient::new().with_logged_in_user(u1());
        let request_id = RequestId::new();

        let effects = ReducerTest::new(TestReducer::new())
            .with_env(env(client.clone()))
            .given_state(AuthState::logged_in(u1()))
            .when_action(AuthAction::LoginAnonymously { request_id })
            .then_state(|state| assert_eq!(*state, AuthState::logged_in(u1())))
            .run();

        let outcome = resolve_only(effects).await;
        assert_eq!(
            outcome,
            AuthAction::TransitionSkipped {
                request_id,
                reason: SkipReason::AlreadyLoggedIn,
            }
        );
        assert_eq!(client.login_calls(), 0);
    }

    #[tokio::test]
    async fn logout_when_logged_out_is_skipped_without_client_call() {
        let client = MockAuthClient::new();
        let request_id = RequestId::new();

        let effects = ReducerTest::new(TestReducer::new())
            .with_env(env(client.clone()))
            .given_state(AuthState::logged_out())
            .when_action(AuthAction::Logout { request_id })
            .then_state(|state| assert_eq!(*state, AuthState::logged_out()))
            .run();

        let outcome = resolve_only(effects).await;
        assert_eq!(
            outcome,
            AuthAction::TransitionSkipped {
                request_id,
                reason: SkipReason::NotLoggedIn,
            }
        );
        assert_eq!(client.logout_calls(), 0);
    }

    #[tokio::test]
    async fn command_during_transition_is_rejected() {
        let in_flight = RequestId::new();
        let request_id = RequestId::new();

        let effects = ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthClient::new()))
            .given_state(AuthState {
                phase: AuthPhase::LoggingIn { request_id: in_flight },
                last_error: None,
                changed_at: None,
            })
            .when_action(AuthAction::Logout { request_id })
            .then_state(move |state| {
                assert_eq!(state.phase, AuthPhase::LoggingIn { request_id: in_flight });
            })
            .run();

        let outcome = resolve_only(effects).await;
        assert_eq!(
            outcome,
            AuthAction::TransitionRejected {
                request_id,
                error: AuthError::TransitionInProgress {
                    phase: PhaseKind::LoggingIn,
                },
            }
        );
    }

    #[test]
    fn login_success_sets_user() {
        let request_id = RequestId::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthClient::new()))
            .given_state(AuthState {
                phase: AuthPhase::LoggingIn { request_id },
                last_error: Some(AuthError::client(ClientOperation::AnonymousLogin, "earlier")),
                changed_at: None,
            })
            .when_action(AuthAction::LoginSucceeded { request_id, user: u1() })
            .then_state(|state| {
                assert!(state.is_logged_in());
                assert_eq!(state.current_user(), Some(&u1()));
                assert_eq!(state.last_error, None);
            })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn login_failure_returns_to_logged_out() {
        let request_id = RequestId::new();
        let error = AuthError::client(ClientOperation::AnonymousLogin, "network down");

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthClient::new()))
            .given_state(AuthState {
                phase: AuthPhase::LoggingIn { request_id },
                last_error: None,
                changed_at: None,
            })
            .when_action(AuthAction::LoginFailed {
                request_id,
                error: error.clone(),
            })
            .then_state(move |state| {
                assert_eq!(state.phase, AuthPhase::LoggedOut);
                assert_eq!(state.current_user(), None);
                assert_eq!(state.last_error, Some(error));
            })
            .run();
    }

    #[test]
    fn stale_login_result_is_ignored() {
        let request_id = RequestId::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthClient::new()))
            .given_state(AuthState::logged_out())
            .when_action(AuthAction::LoginSucceeded { request_id, user: u1() })
            .then_state(|state| assert_eq!(*state, AuthState::logged_out()))
            .run();
    }

    #[tokio::test]
    async fn logout_from_logged_in_calls_client() {
        let client = MockAuthClient::new().with_logged_in_user(u1());
        let request_id = RequestId::new();

        let effects = ReducerTest::new(TestReducer::new())
            .with_env(env(client.clone()))
            .given_state(AuthState::logged_in(u1()))
            .when_action(AuthAction::Logout { request_id })
            .then_state(move |state| {
                assert_eq!(state.phase, AuthPhase::LoggingOut { request_id, user: u1() });
                assert!(state.is_logged_in());
            })
            .run();

        assert_eq!(resolve_only(effects).await, AuthAction::LogoutSucceeded { request_id });
        assert_eq!(client.logout_calls(), 1);
        assert!(client.current_user().is_none());
    }

    #[test]
    fn logout_failure_restores_user() {
        let request_id = RequestId::new();
        let error = AuthError::client(ClientOperation::Logout, "offline");

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthClient::new()))
            .given_state(AuthState {
                phase: AuthPhase::LoggingOut { request_id, user: u1() },
                last_error: None,
                changed_at: None,
            })
            .when_action(AuthAction::LogoutFailed {
                request_id,
                error: error.clone(),
            })
            .then_state(move |state| {
                assert_eq!(state.phase, AuthPhase::LoggedIn { user: u1() });
                assert_eq!(state.last_error, Some(error));
            })
            .run();
    }

    #[test]
    fn stale_logout_failure_keeps_phase() {
        let in_flight = RequestId::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthClient::new()))
            .given_state(AuthState {
                phase: AuthPhase::LoggingOut { request_id: in_flight, user: u1() },
                last_error: None,
                changed_at: None,
            })
            .when_action(AuthAction::LogoutFailed {
                request_id: RequestId::new(),
                error: AuthError::client(ClientOperation::Logout, "offline"),
            })
            .then_state(move |state| {
                assert_eq!(state.phase, AuthPhase::LoggingOut { request_id: in_flight, user: u1() });
                assert_eq!(state.last_error, None);
            })
            .run();
    }

    #[tokio::test]
    async fn slow_client_times_out() {
        let client = MockAuthClient::new().with_latency(Duration::from_millis(200));
        let request_id = RequestId::new();

        let effects = ReducerTest::new(TestReducer::with_client_timeout(Duration::from_millis(10)))
            .with_env(env(client))
            .given_state(AuthState::logged_out())
            .when_action(AuthAction::LoginAnonymously { request_id })
            .run();

        assert_eq!(
            resolve_only(effects).await,
            AuthAction::LoginFailed {
                request_id,
                error: AuthError::Timeout {
                    operation: ClientOperation::AnonymousLogin,
                    after: Duration::from_millis(10),
                },
            }
        );
    }

    #[tokio::test]
    async fn panicking_client_call_becomes_internal_error() {
        let outcome: Result<()> =
            guarded_call(ClientOperation::Logout, Duration::from_secs(1), || async {
                explode::<Result<()>>()
            })
            .await;

        assert_eq!(
            outcome,
            Err(AuthError::Internal(
                "auth client panicked during logout".to_string()
            ))
        );
    }

    #[test]
    fn logout_when_logged_out_logs_diagnostic() {
        let logs = capture_logs(tracing::Level::INFO, || {
            ReducerTest::new(TestReducer::new())
                .with_env(env(MockAuthClient::new()))
                .given_state(AuthState::logged_out())
                .when_action(AuthAction::Logout {
                    request_id: RequestId::new(),
                })
                .run();
        });

        assert!(
            logs.contains("Can't log out when no user is logged in"),
            "logs: {logs}"
        );
        assert!(logs.contains("INFO"), "logs: {logs}");
    }

    #[test]
    fn redundant_login_is_silent_at_info() {
        let logs = capture_logs(tracing::Level::INFO, || {
            ReducerTest::new(TestReducer::new())
                .with_env(env(MockAuthClient::new()))
                .given_state(AuthState::logged_in(u1()))
                .when_action(AuthAction::LoginAnonymously {
                    request_id: RequestId::new(),
                })
                .run();
        });

        assert!(logs.is_empty(), "logs: {logs}");
    }
}
