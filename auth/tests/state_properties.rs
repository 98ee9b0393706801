//! Property tests for the auth state machine.
//!
//! Random sequences of commands and scripted client failures are driven
//! through the reducer, resolving every effect before the next step.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use session_auth::mocks::{MockAuthClient, MockUser};
use session_auth::providers::AuthClient;
use session_auth::{AuthAction, AuthEnvironment, AuthReducer, AuthState, RequestId};
use session_core::effect::Effect;
use session_core::reducer::Reducer;
use session_testing::{resolve_effect, test_clock, FixedClock};

#[derive(Debug, Clone, Copy)]
enum Step {
    Login,
    Logout,
    FailNextLogin,
    FailNextLogout,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Login),
        3 => Just(Step::Logout),
        1 => Just(Step::FailNextLogin),
        1 => Just(Step::FailNextLogout),
    ]
}

/// Reduce `action` and every action its effects feed back, until quiet.
async fn settle(
    reducer: &AuthReducer<MockAuthClient, FixedClock>,
    state: &mut AuthState<MockUser>,
    env: &AuthEnvironment<MockAuthClient, FixedClock>,
    action: AuthAction<MockUser>,
) {
    let mut pending: Vec<Effect<AuthAction<MockUser>>> =
        reducer.reduce(state, action, env).into_iter().collect();

    while let Some(effect) = pending.pop() {
        if let Some(next) = resolve_effect(effect).await {
            pending.extend(reducer.reduce(state, next, env));
        }
    }
}

proptest! {
    #[test]
    fn settled_state_is_consistent(
        initially_logged_in in any::<bool>(),
        steps in prop::collection::vec(step(), 0..24),
    ) {
        let client = if initially_logged_in {
            MockAuthClient::new().with_logged_in_user(MockUser::new("seed"))
        } else {
            MockAuthClient::new()
        };
        let env = AuthEnvironment::new(client.clone(), test_clock());
        let reducer: AuthReducer<MockAuthClient, FixedClock> = AuthReducer::new();
        let mut state = AuthState::from_client(&client);

        tokio_test::block_on(async {
            for step in steps {
                match step {
                    Step::FailNextLogin => client.fail_next_login("scripted"),
                    Step::FailNextLogout => client.fail_next_logout("scripted"),
                    Step::Login => {
                        let action = AuthAction::LoginAnonymously { request_id: RequestId::new() };
                        settle(&reducer, &mut state, &env, action).await;
                    },
                    Step::Logout => {
                        let action = AuthAction::Logout { request_id: RequestId::new() };
                        settle(&reducer, &mut state, &env, action).await;
                    },
                }

                assert!(!state.phase.is_transitioning());
                assert_eq!(state.current_user().is_none(), !state.is_logged_in());
                assert_eq!(state.current_user().cloned(), client.current_user());
            }
        });
    }
}
