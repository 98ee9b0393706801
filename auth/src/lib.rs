//! # Session Auth
//!
//! Anonymous login and logout state for an application, held by an explicit
//! provider and published to any number of consumers.
//!
//! ## Features
//!
//! - **Explicit wiring**: the composition root owns an [`AuthProvider`] and hands out [`AuthHandle`]s
//! - **Single source of truth**: one store holds the phase, user and last error
//! - **Serialized transitions**: a login or logout in flight rejects further commands
//! - **Uniform results**: both actions resolve to `Result<Transition>`
//! - **Quiet subscribers**: snapshots are republished only when they change
//!
//! ## Architecture
//!
//! Login and logout are reducers and effects over an [`AuthClient`]:
//!
//! ```text
//! LoginAnonymously → Reducer → (LoggingIn, client call) → LoginSucceeded → LoggedIn
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let provider = AuthProvider::new(client, SystemClock, AuthConfig::default());
//! provider.start()?;
//!
//! let auth = provider.handle();
//! auth.actions().login_anonymously().await?;
//! assert!(auth.info()?.is_logged_in);
//!
//! provider.stop().await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod config;
pub mod environment;
pub mod error;
pub mod info;
pub mod provider;
pub mod providers;
pub mod reducers;
pub mod state;

mod publisher;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::{AuthAction, SkipReason, Transition};
pub use config::AuthConfig;
pub use environment::AuthEnvironment;
pub use error::{AuthError, ClientOperation, Result};
pub use info::AuthInfo;
pub use provider::{AuthActions, AuthHandle, AuthProvider};
pub use providers::AuthClient;
pub use reducers::AuthReducer;
pub use state::{AuthPhase, AuthState, PhaseKind, RequestId};
