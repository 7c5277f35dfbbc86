//! HTTP authentication against OAuth2-style token endpoints.
//!
//! This module provides the `HttpAuthenticator`, an `Authenticator` that
//! posts a password-grant form and turns the JSON answer into a
//! `TokenSession`. Failures are reported as `AuthError`.

pub mod client;
pub mod error;

pub use client::{HttpAuthenticator, TokenSession, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::AuthError;
