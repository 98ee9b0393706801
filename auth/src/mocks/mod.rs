//! Mock provider implementations for testing.
//!
//! This module provides a simple, in-memory implementation of the auth client
//! for use in unit tests, integration tests and demos.

pub mod client;

pub use client::{MockAuthClient, MockUser};
