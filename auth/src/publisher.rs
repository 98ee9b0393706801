//! Republishes auth state to subscribers.
//!
//! The publisher re-derives [`AuthInfo`] after every state change and
//! replaces the published value only when the snapshot differs, so
//! subscribers are not woken by changes they cannot observe.

use crate::info::AuthInfo;
use crate::provider::{AuthActions, AuthStore};
use crate::providers::AuthClient;
use session_core::environment::Clock;
use tokio::sync::watch;

/// Re-derive the snapshot from the store and publish it if it changed.
///
/// Returns `true` when subscribers were notified.
pub(crate) async fn refresh<C, K>(
    store: &AuthStore<C, K>,
    actions: &AuthActions<C, K>,
    sender: &watch::Sender<AuthInfo<C, K>>,
) -> bool
where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    let next = store.state(|state| AuthInfo::derive(state, actions)).await;

    let published = sender.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });

    if published {
        metrics::counter!("auth.info.published").increment(1);
        tracing::debug!(info = ?*sender.borrow(), "Published auth snapshot");
    }

    published
}

/// Follow the store's state-change signal. Runs until the provider aborts it.
pub(crate) async fn run<C, K>(
    store: AuthStore<C, K>,
    actions: AuthActions<C, K>,
    sender: std::sync::Arc<watch::Sender<AuthInfo<C, K>>>,
) where
    C: AuthClient,
    K: Clock + Clone + 'static,
{
    let mut changes = store.state_changes();
    refresh(&store, &actions, &sender).await;

    while changes.changed().await.is_ok() {
        refresh(&store, &actions, &sender).await;
    }

    tracing::debug!("State-change signal closed, auth publisher finished");
}
