//! Authentication module for holding and refreshing sessions.
//!
//! This module provides:
//! - `SessionHolder`: owns credentials and one session, logs in lazily and
//!   again once the validity window has passed
//! - `SharedSessionHolder`: the same behind a cloneable, lock-protected handle
//! - `Authenticator`: the trait an external login entry point implements
//! - `CredentialStore`: Secure OS-level credential storage via keyring

pub mod credentials;
pub mod holder;
pub mod shared;

pub use credentials::{CredentialStore, Credentials};
pub use holder::{
    Authenticator, ExpiryPolicy, HolderState, SessionHolder, SessionPolicy, SessionRecord,
};
pub use shared::SharedSessionHolder;
