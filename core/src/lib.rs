//! # Session Core
//!
//! Core traits and types for the session workspace.
//!
//! This crate provides the small set of abstractions every feature crate is
//! built on: a pure state machine (the reducer), descriptions of side effects,
//! and injected dependencies.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature
//! - **Action**: All possible inputs to a reducer (commands and the events effects feed back)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use session_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for SessionReducer {
//!     type State = SessionState;
//!     type Action = SessionAction;
//!     type Environment = SessionEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut SessionState,
//!         action: SessionAction,
//!         env: &SessionEnvironment,
//!     ) -> SmallVec<[Effect<SessionAction>; 4]> {
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for SessionReducer {
    ///     type State = SessionState;
    ///     type Action = SessionAction;
    ///     type Environment = SessionEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut SessionState,
    ///         action: SessionAction,
    ///         env: &SessionEnvironment,
    ///     ) -> SmallVec<[Effect<SessionAction>; 4]> {
    ///         match action {
    ///             SessionAction::SignIn => {
    ///                 state.signing_in = true;
    ///                 smallvec![Effect::None]
    ///             }
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// The effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution), returned from reducers.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap an async computation as an effect
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// An effect that immediately feeds `action` back into the reducer
        ///
        /// Used to report synchronous outcomes (rejections, no-ops) through the
        /// same channel as asynchronous ones.
        pub fn send(action: Action) -> Self
        where
            Action: Send + 'static,
        {
            Effect::Future(Box::pin(async move { Some(action) }))
        }

        /// Returns `true` for `Effect::None`
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use session_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[test]
    fn effect_debug_hides_future() {
        let effect: Effect<u8> = Effect::send(1);
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
        assert!(Effect::<u8>::None.is_none());
    }

    #[test]
    fn send_effect_resolves_to_action() {
        let effect: Effect<u8> = Effect::send(7);
        let Effect::Future(fut) = effect else {
            unreachable!("send always builds a future effect");
        };
        assert_eq!(tokio_test::block_on(fut), Some(7));
    }
}
