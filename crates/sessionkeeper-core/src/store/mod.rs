//! Local persistence for holder state between runs.
//!
//! Sessions are written encrypted, so a stolen vault file is useless without
//! the passphrase it was sealed with.

pub mod vault;

pub use vault::SessionVault;
