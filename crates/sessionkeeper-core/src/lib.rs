//! Core library for sessionkeeper.
//!
//! Keeps a login session to some external API usable: a `SessionHolder` owns
//! the credentials, logs in lazily and logs in again once the configured
//! validity window has passed. Callers get a private copy of the session and
//! make their API calls with it directly.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod store;
pub mod utils;

pub use api::{AuthError, HttpAuthenticator, TokenSession};
pub use auth::{
    Authenticator, CredentialStore, Credentials, ExpiryPolicy, HolderState, SessionHolder,
    SessionPolicy, SessionRecord, SharedSessionHolder,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use store::SessionVault;
