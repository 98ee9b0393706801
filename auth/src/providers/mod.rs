//! Authentication providers.
//!
//! Traits for the external dependencies of the auth reducer. Providers are
//! **interfaces**, not implementations: the reducer depends on these traits,
//! and the composition root supplies a concrete client.
//!
//! This enables:
//! - **Testing**: Use mocks (in-memory, deterministic)
//! - **Production**: Wrap the real authentication SDK

pub mod client;

// Re-export provider traits
pub use client::AuthClient;
