//! Integration tests for Store action broadcasting
//!
//! Tests the observation features that let callers wait for the outcome of
//! a command they sent, and let publishers follow state changes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use session_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use session_runtime::{Store, StoreError};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    /// Command answered after a delay
    Request { id: u64, delay_ms: u64 },
    /// Answer to `Request`
    Answered { id: u64 },
}

#[derive(Debug, Clone, Default)]
struct TestState {
    in_flight: Vec<u64>,
    answered: Vec<u64>,
}

#[derive(Clone)]
struct TestEnvironment;

#[derive(Clone)]
struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;
    type Environment = TestEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TestAction::Request { id, delay_ms } => {
                state.in_flight.push(id);
                smallvec![Effect::future(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Some(TestAction::Answered { id })
                })]
            },
            TestAction::Answered { id } => {
                state.in_flight.retain(|pending| *pending != id);
                state.answered.push(id);
                smallvec![Effect::None]
            },
        }
    }
}

fn store() -> Store<TestState, TestAction, TestEnvironment, TestReducer> {
    Store::new(TestState::default(), TestReducer, TestEnvironment)
}

// ============================================================================
// Tests
// ============================================================================

/// Concurrent callers each receive the answer to their own request,
/// regardless of completion order.
#[tokio::test]
async fn test_send_and_wait_for_correlates_concurrent_requests() {
    let store = store();

    let slow = store.send_and_wait_for(
        TestAction::Request { id: 1, delay_ms: 60 },
        |action| matches!(action, TestAction::Answered { id: 1 }),
        Duration::from_secs(1),
    );
    let fast = store.send_and_wait_for(
        TestAction::Request { id: 2, delay_ms: 5 },
        |action| matches!(action, TestAction::Answered { id: 2 }),
        Duration::from_secs(1),
    );

    let (slow, fast) = tokio::join!(slow, fast);

    assert_eq!(slow.unwrap(), TestAction::Answered { id: 1 });
    assert_eq!(fast.unwrap(), TestAction::Answered { id: 2 });
    assert_eq!(store.state(|s| s.answered.clone()).await, vec![2, 1]);
}

/// Subscribers see feedback actions only, never the external commands.
#[tokio::test]
async fn test_subscribers_observe_feedback_actions() {
    let store = store();
    let mut actions = store.subscribe_actions();

    store
        .send(TestAction::Request { id: 7, delay_ms: 0 })
        .await
        .unwrap()
        .wait()
        .await;

    let observed = tokio::time::timeout(Duration::from_secs(1), actions.recv())
        .await
        .expect("feedback broadcast")
        .unwrap();
    assert_eq!(observed, TestAction::Answered { id: 7 });
    assert!(actions.try_recv().is_err());
}

/// Waiters see the reduced state as soon as their answer arrives.
#[tokio::test]
async fn test_state_is_reduced_before_broadcast() {
    let store = store();

    store
        .send_and_wait_for(
            TestAction::Request { id: 3, delay_ms: 10 },
            |action| matches!(action, TestAction::Answered { id: 3 }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    let (in_flight, answered) = store
        .state(|s| (s.in_flight.clone(), s.answered.clone()))
        .await;
    assert!(in_flight.is_empty());
    assert_eq!(answered, vec![3]);
}

/// Every reduction advances the state-change signal.
#[tokio::test]
async fn test_state_changes_follow_reductions() {
    let store = store();
    let mut changes = store.state_changes();
    let start = *changes.borrow_and_update();

    store
        .send_and_wait_for(
            TestAction::Request { id: 4, delay_ms: 0 },
            |action| matches!(action, TestAction::Answered { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert!(changes.has_changed().unwrap());
    assert_eq!(*changes.borrow_and_update(), start + 2);
}

/// A waiter whose answer never comes times out.
#[tokio::test]
async fn test_send_and_wait_for_times_out() {
    let store = store();

    let result = store
        .send_and_wait_for(
            TestAction::Request { id: 5, delay_ms: 200 },
            |action| matches!(action, TestAction::Answered { id: 99 }),
            Duration::from_millis(20),
        )
        .await;

    assert_eq!(result.unwrap_err(), StoreError::Timeout);
}

/// Shutdown lets in-flight answers land, then refuses new commands.
#[tokio::test]
async fn test_shutdown_settles_in_flight_requests() {
    let store = store();
    let mut actions = store.subscribe_actions();

    store
        .send(TestAction::Request { id: 6, delay_ms: 30 })
        .await
        .unwrap();
    store.shutdown(Duration::from_secs(1)).await.unwrap();

    assert_eq!(actions.recv().await.unwrap(), TestAction::Answered { id: 6 });
    assert_eq!(
        store
            .send(TestAction::Request { id: 8, delay_ms: 0 })
            .await
            .unwrap_err(),
        StoreError::ShutdownInProgress
    );
}
