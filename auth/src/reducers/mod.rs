//! Authentication reducers.
//!
//! Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.

pub mod anonymous;

// Re-export
pub use anonymous::AuthReducer;
