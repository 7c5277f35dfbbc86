use std::fmt;

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "sessionkeeper";

/// Everything needed to establish a session.
/// Fields are private and there are no setters: once built, a credential set
/// never changes. Build a new one instead.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identifier: String,
    secret: String,
    private_key: Option<String>,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
            private_key: None,
        }
    }

    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub struct CredentialStore;

impl CredentialStore {
    /// Store the secret for an identifier in the OS keychain
    pub fn store(credentials: &Credentials) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, credentials.identifier())
            .context("Failed to create keyring entry")?;
        entry
            .set_password(credentials.secret())
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the secret for an identifier from the OS keychain
    pub fn get_password(identifier: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, identifier)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Rebuild a credential set from the keychain
    pub fn load(identifier: &str) -> Result<Credentials> {
        let secret = Self::get_password(identifier)?;
        Ok(Credentials::new(identifier, secret))
    }

    /// Delete stored credentials for an identifier
    pub fn delete(identifier: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, identifier)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    /// Check if credentials exist for an identifier
    pub fn has_credentials(identifier: &str) -> bool {
        if let Ok(entry) = Entry::new(SERVICE_NAME, identifier) {
            entry.get_password().is_ok()
        } else {
            false
        }
    }
}
