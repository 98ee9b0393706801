//! Authentication environment.
//!
//! This module defines the environment type for dependency injection
//! in the auth reducer.

use crate::providers::AuthClient;
use session_core::environment::Clock;

/// Authentication environment.
///
/// Contains all external dependencies needed by the auth reducer.
///
/// # Type Parameters
///
/// - `C`: External auth client
/// - `K`: Clock used to stamp phase changes
#[derive(Debug, Clone)]
pub struct AuthEnvironment<C, K>
where
    C: AuthClient,
    K: Clock + Clone,
{
    /// External auth client.
    pub client: C,

    /// Clock.
    pub clock: K,
}

impl<C, K> AuthEnvironment<C, K>
where
    C: AuthClient,
    K: Clock + Clone,
{
    /// Create a new authentication environment.
    #[must_use]
    pub const fn new(client: C, clock: K) -> Self {
        Self { client, clock }
    }
}
