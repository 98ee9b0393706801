//! The auth provider and the handles it gives out.
//!
//! [`AuthProvider`] is owned by the application's composition root. It seeds
//! the state from the client, owns the store, and runs the publisher between
//! [`start`](AuthProvider::start) and [`stop`](AuthProvider::stop).
//! Consumers receive an [`AuthHandle`] (read access and subscriptions) or
//! just the [`AuthActions`]. Neither keeps the provider alive.

use crate::actions::{AuthAction, Transition};
use crate::config::AuthConfig;
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, ClientOperation, Result};
use crate::info::AuthInfo;
use crate::providers::AuthClient;
use crate::publisher;
use crate::reducers::AuthReducer;
use crate::state::{AuthState, RequestId};
use session_core::environment::Clock;
use session_runtime::{Store, StoreError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The store type behind a provider.
pub type AuthStore<C, K> = Store<
    AuthState<<C as AuthClient>::User>,
    AuthAction<<C as AuthClient>::User>,
    AuthEnvironment<C, K>,
    AuthReducer<C, K>,
>;

const IDLE: u8 = 0;
const MOUNTED: u8 = 1;
const STOPPED: u8 = 2;

pub(crate) struct ProviderInner<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    store: AuthStore<C, K>,
    config: AuthConfig,
    lifecycle: AtomicU8,
    publisher: Mutex<Option<JoinHandle<()>>>,
    info: Arc<watch::Sender<AuthInfo<C, K>>>,
}

impl<C, K> ProviderInner<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn ensure_mounted(&self) -> Result<()> {
        if self.lifecycle.load(Ordering::Acquire) == MOUNTED {
            Ok(())
        } else {
            Err(AuthError::NotMounted)
        }
    }

    fn actions(self: &Arc<Self>) -> AuthActions<C, K> {
        AuthActions {
            inner: Arc::downgrade(self),
        }
    }

    async fn dispatch(self: &Arc<Self>, action: AuthAction<C::User>) -> Result<Transition> {
        let request_id = action.request_id();
        let fallback = self.timed_out_outcome(&action);

        let outcome = match self
            .store
            .send_and_wait_for(
                action,
                move |candidate| candidate.is_outcome_of(request_id),
                self.config.response_timeout(),
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(StoreError::Timeout) => {
                tracing::warn!(%request_id, "No outcome in time, settling the request as timed out");
                metrics::counter!("auth.dispatch.timeout").increment(1);

                // Ignored as stale if the real outcome has already landed
                if let Err(error) = self.store.send(fallback.clone()).await {
                    tracing::warn!(%request_id, %error, "Could not settle timed-out request");
                }
                fallback
            },
            Err(error) => return Err(error.into()),
        };

        // Callers read the result through the snapshot, so make it current now
        publisher::refresh(&self.store, &self.actions(), &self.info).await;

        outcome.into_transition()
    }

    /// The failure event that settles `command` when its outcome never reaches the caller.
    fn timed_out_outcome(&self, command: &AuthAction<C::User>) -> AuthAction<C::User> {
        let request_id = command.request_id();
        let after = self.config.response_timeout();

        if let AuthAction::Logout { .. } = command {
            AuthAction::LogoutFailed {
                request_id,
                error: AuthError::Timeout {
                    operation: ClientOperation::Logout,
                    after,
                },
            }
        } else {
            AuthAction::LoginFailed {
                request_id,
                error: AuthError::Timeout {
                    operation: ClientOperation::AnonymousLogin,
                    after,
                },
            }
        }
    }

    fn abort_publisher(&self) {
        if let Ok(mut slot) = self.publisher.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Provider
// ═══════════════════════════════════════════════════════════════════════

/// Owner of the auth state.
///
/// # Examples
///
/// ```
/// use session_auth::mocks::{MockAuthClient, MockUser};
/// use session_auth::{AuthConfig, AuthProvider, Transition};
/// use session_core::environment::SystemClock;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> session_auth::Result<()> {
/// let client = MockAuthClient::new().with_next_user(MockUser::new("u1"));
/// let provider = AuthProvider::new(client, SystemClock, AuthConfig::default());
/// provider.start()?;
///
/// let auth = provider.handle();
/// assert_eq!(auth.actions().login_anonymously().await?, Transition::Completed);
/// assert_eq!(auth.info()?.current_user, Some(MockUser::new("u1")));
///
/// provider.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct AuthProvider<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    inner: Arc<ProviderInner<C, K>>,
}

impl<C, K> AuthProvider<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    /// Build a provider, seeding the state from the client's synchronous queries.
    ///
    /// The provider is not mounted until [`start`](Self::start) is called.
    #[must_use]
    pub fn new(client: C, clock: K, config: AuthConfig) -> Self {
        let state = AuthState::from_client(&client);
        tracing::info!(
            logged_in = state.is_logged_in(),
            "Auth state seeded from client"
        );

        let reducer = AuthReducer::from_config(&config);
        let store_config = config.store_config();

        let inner = Arc::new_cyclic(|weak: &Weak<ProviderInner<C, K>>| {
            let actions = AuthActions {
                inner: weak.clone(),
            };
            let (info, _) = watch::channel(AuthInfo::derive(&state, &actions));
            let store = Store::with_config(
                state,
                reducer,
                AuthEnvironment::new(client, clock),
                &store_config,
            );

            ProviderInner {
                store,
                config,
                lifecycle: AtomicU8::new(IDLE),
                publisher: Mutex::new(None),
                info: Arc::new(info),
            }
        });

        Self { inner }
    }

    /// A read handle for consumers.
    #[must_use]
    pub fn handle(&self) -> AuthHandle<C, K> {
        AuthHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The login and logout actions.
    #[must_use]
    pub fn actions(&self) -> AuthActions<C, K> {
        self.inner.actions()
    }

    /// The provider's configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// Whether the provider is between `start()` and `stop()`.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.ensure_mounted().is_ok()
    }

    /// Mount the provider: accept actions and start publishing.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AlreadyStarted`] if already mounted
    /// - [`AuthError::Stopped`] if the provider has been stopped
    /// - [`AuthError::Internal`] if called outside a Tokio runtime
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|error| {
            tracing::error!(%error, "Auth provider started outside a Tokio runtime");
            AuthError::Internal("start() must be called within a Tokio runtime".to_string())
        })?;

        match self.inner.lifecycle.compare_exchange(
            IDLE,
            MOUNTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {},
            Err(MOUNTED) => return Err(AuthError::AlreadyStarted),
            Err(_) => return Err(AuthError::Stopped),
        }

        let task = runtime.spawn(publisher::run(
            self.inner.store.clone(),
            self.actions(),
            Arc::clone(&self.inner.info),
        ));

        match self.inner.publisher.lock() {
            Ok(mut slot) => *slot = Some(task),
            Err(_) => {
                task.abort();
                return Err(AuthError::Internal("Mutex lock failed".to_string()));
            },
        }

        tracing::info!("Auth provider mounted");
        metrics::counter!("auth.provider.started").increment(1);
        Ok(())
    }

    /// Unmount the provider.
    ///
    /// New actions are refused at once; client calls already in flight are
    /// given up to `shutdown_timeout` to settle. The final state is published
    /// before the publisher stops, and pending [`AuthHandle::wait_for`] calls
    /// return [`AuthError::NotMounted`].
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotMounted`] if the provider is not mounted
    /// - [`AuthError::Store`] if in-flight calls did not settle in time
    pub async fn stop(&self) -> Result<()> {
        if self
            .inner
            .lifecycle
            .compare_exchange(MOUNTED, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AuthError::NotMounted);
        }

        tracing::info!("Stopping auth provider");
        let drained = self.inner.store.shutdown_with_default_timeout().await;

        publisher::refresh(&self.inner.store, &self.actions(), &self.inner.info).await;
        // Wake waiters so they observe the unmount
        self.inner.info.send_modify(|_| {});
        self.inner.abort_publisher();

        metrics::counter!("auth.provider.stopped").increment(1);
        drained.map_err(AuthError::from)
    }
}

impl<C, K> Drop for AuthProvider<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn drop(&mut self) {
        self.inner.abort_publisher();
    }
}

impl<C, K> std::fmt::Debug for AuthProvider<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProvider")
            .field("mounted", &self.is_mounted())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Consumer Handles
// ═══════════════════════════════════════════════════════════════════════

/// Consumer view of a provider.
///
/// Every accessor fails with [`AuthError::NotMounted`] outside
/// `start()`..`stop()`, and with [`AuthError::ProviderUnavailable`] once the
/// provider is dropped.
pub struct AuthHandle<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    inner: Weak<ProviderInner<C, K>>,
}

impl<C, K> AuthHandle<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    /// A handle bound to no provider.
    #[must_use]
    pub const fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    fn mounted(&self) -> Result<Arc<ProviderInner<C, K>>> {
        let inner = self.inner.upgrade().ok_or(AuthError::ProviderUnavailable)?;
        inner.ensure_mounted()?;
        Ok(inner)
    }

    /// The current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotMounted`] or [`AuthError::ProviderUnavailable`].
    pub fn info(&self) -> Result<AuthInfo<C, K>> {
        let inner = self.mounted()?;
        let info = inner.info.borrow().clone();
        Ok(info)
    }

    /// Whether a user is logged in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotMounted`] or [`AuthError::ProviderUnavailable`].
    pub fn is_logged_in(&self) -> Result<bool> {
        let inner = self.mounted()?;
        let logged_in = inner.info.borrow().is_logged_in;
        Ok(logged_in)
    }

    /// Subscribe to snapshot changes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotMounted`] or [`AuthError::ProviderUnavailable`].
    pub fn subscribe(&self) -> Result<watch::Receiver<AuthInfo<C, K>>> {
        Ok(self.mounted()?.info.subscribe())
    }

    /// Wait for a snapshot satisfying `predicate`, checking the current one first.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotMounted`] if not mounted when called or if the
    /// provider is stopped while waiting, and [`AuthError::ProviderUnavailable`]
    /// if the provider is dropped while waiting.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<AuthInfo<C, K>>
    where
        F: FnMut(&AuthInfo<C, K>) -> bool,
    {
        let mut receiver = self.subscribe()?;

        loop {
            {
                let info = receiver.borrow_and_update();
                if predicate(&info) {
                    return Ok(info.clone());
                }
            }

            self.mounted()?;

            receiver
                .changed()
                .await
                .map_err(|_| AuthError::ProviderUnavailable)?;
        }
    }

    /// The login and logout actions of this handle's provider.
    #[must_use]
    pub fn actions(&self) -> AuthActions<C, K> {
        AuthActions {
            inner: self.inner.clone(),
        }
    }
}

impl<C, K> Clone for AuthHandle<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C, K> std::fmt::Debug for AuthHandle<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHandle")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Login and logout for one provider.
///
/// Two `AuthActions` are equal when they act on the same provider.
pub struct AuthActions<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    inner: Weak<ProviderInner<C, K>>,
}

impl<C, K> AuthActions<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    /// Actions bound to no provider; every call fails.
    #[must_use]
    pub const fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    fn mounted(&self) -> Result<Arc<ProviderInner<C, K>>> {
        let inner = self.inner.upgrade().ok_or(AuthError::ProviderUnavailable)?;
        inner.ensure_mounted()?;
        Ok(inner)
    }

    /// Log in anonymously if no user is logged in.
    ///
    /// Resolves once the client has answered and the new state is published.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Client`] / [`AuthError::Timeout`] if the client failed; state is unchanged
    /// - [`AuthError::TransitionInProgress`] if a login or logout is in flight
    /// - [`AuthError::NotMounted`] / [`AuthError::ProviderUnavailable`] on misuse
    #[tracing::instrument(skip(self), name = "auth_login_anonymously")]
    pub async fn login_anonymously(&self) -> Result<Transition> {
        let inner = self.mounted()?;
        inner
            .dispatch(AuthAction::LoginAnonymously {
                request_id: RequestId::new(),
            })
            .await
    }

    /// Log the current user out if one is logged in.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Client`] / [`AuthError::Timeout`] if the client failed; the user stays logged in
    /// - [`AuthError::TransitionInProgress`] if a login or logout is in flight
    /// - [`AuthError::NotMounted`] / [`AuthError::ProviderUnavailable`] on misuse
    #[tracing::instrument(skip(self), name = "auth_logout")]
    pub async fn logout(&self) -> Result<Transition> {
        let inner = self.mounted()?;
        inner
            .dispatch(AuthAction::Logout {
                request_id: RequestId::new(),
            })
            .await
    }
}

impl<C, K> Clone for AuthActions<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C, K> PartialEq for AuthActions<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C, K> Eq for AuthActions<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
}

impl<C, K> std::fmt::Debug for AuthActions<C, K>
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthActions")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}
