//! Anonymous login demo binary
//!
//! Mounts an auth provider over the mock client, subscribes to its
//! snapshots, and walks through login and logout including the no-op cases.
//!
//! An `AuthConfig` can be supplied as JSON in `ANONYMOUS_LOGIN_CONFIG`, e.g.
//! `{"client_timeout_ms": 2000}`.

use anyhow::Context;
use session_auth::mocks::{MockAuthClient, MockUser};
use session_auth::{AuthConfig, AuthProvider};
use session_core::environment::SystemClock;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "ANONYMOUS_LOGIN_CONFIG";

fn load_config() -> anyhow::Result<AuthConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(json) => serde_json::from_str(&json).with_context(|| format!("invalid {CONFIG_ENV}")),
        Err(_) => Ok(AuthConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "anonymous_login=debug,session_auth=debug,session_runtime=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Anonymous Login Demo ===\n");

    let config = load_config()?;
    tracing::info!(?config, "Loaded auth configuration");

    // The composition root owns the provider; everything else gets handles
    let client = MockAuthClient::new()
        .with_next_user(MockUser::new("u1"))
        .with_latency(Duration::from_millis(50));
    let provider = AuthProvider::new(client, SystemClock, config);
    provider.start()?;

    let auth = provider.handle();
    let mut updates = auth.subscribe()?;
    println!("Initial snapshot: {}", serde_json::to_string(&*updates.borrow_and_update())?);

    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let json = serde_json::to_string(&*updates.borrow_and_update());
            match json {
                Ok(json) => println!("  published: {json}"),
                Err(error) => tracing::warn!(%error, "Failed to render snapshot"),
            }
        }
    });

    let actions = auth.actions();

    println!("\n>>> login_anonymously()");
    println!("Result: {:?}", actions.login_anonymously().await);

    println!("\n>>> login_anonymously() again");
    println!("Result: {:?}", actions.login_anonymously().await);

    println!("\n>>> logout()");
    println!("Result: {:?}", actions.logout().await);

    println!("\n>>> logout() again");
    println!("Result: {:?}", actions.logout().await);

    let info = auth.info()?;
    println!("\nFinal snapshot: {}", serde_json::to_string(&info)?);

    provider.stop().await?;
    println!("Provider stopped; accessor now reports: {:?}", auth.info().err());

    // Dropping the provider closes the snapshot channel and ends the printer
    drop(provider);
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        tracing::warn!("Snapshot printer did not finish");
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
