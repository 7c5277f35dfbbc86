use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::SessionRecord;

/// Bump when the on-disk layout changes.
const VAULT_VERSION: u8 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct VaultFile {
    version: u8,
    salt: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// Encrypted file holding one `SessionRecord`.
///
/// The key is derived from a passphrase with Argon2 and a per-write random
/// salt; the record is sealed with ChaCha20-Poly1305.
pub struct SessionVault {
    path: PathBuf,
}

impl SessionVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Encrypt and write a record, replacing any previous one
    pub fn save<S: Serialize>(&self, record: &SessionRecord<S>, passphrase: &str) -> Result<()> {
        let plaintext = serde_json::to_vec(record).context("Failed to serialize session")?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let cipher = Self::cipher(passphrase, &salt)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|e| anyhow!("Failed to encrypt session: {}", e))?;

        let file = VaultFile {
            version: VAULT_VERSION,
            salt: salt.to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, contents).context("Failed to write session vault")?;
        debug!(path = %self.path.display(), "Session vault saved");
        Ok(())
    }

    /// Read and decrypt the stored record. `Ok(None)` when there is no vault.
    pub fn load<S: DeserializeOwned>(&self, passphrase: &str) -> Result<Option<SessionRecord<S>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path).context("Failed to read session vault")?;
        let file: VaultFile = serde_json::from_str(&contents).context("Failed to parse session vault")?;

        if file.version != VAULT_VERSION {
            bail!("Unsupported session vault version {}", file.version);
        }
        if file.salt.len() != SALT_LEN || file.nonce.len() != NONCE_LEN {
            bail!("Session vault is corrupt");
        }

        let cipher = Self::cipher(passphrase, &file.salt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&file.nonce), file.ciphertext.as_ref())
            .map_err(|_| anyhow!("Failed to decrypt session vault (wrong passphrase or tampered file)"))?;

        let record = serde_json::from_slice(&plaintext).context("Failed to parse decrypted session")?;
        debug!(path = %self.path.display(), "Session vault loaded");
        Ok(Some(record))
    }

    /// Delete the vault file if present
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to delete session vault")?;
        }
        Ok(())
    }

    fn cipher(passphrase: &str, salt: &[u8]) -> Result<ChaCha20Poly1305> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow!("Failed to derive vault key: {}", e))?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(&key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn temp_vault(name: &str) -> SessionVault {
        let dir = std::env::temp_dir().join(format!("sessionkeeper-vault-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        SessionVault::new(dir.join("session.vault"))
    }

    fn record() -> SessionRecord<String> {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        SessionRecord {
            session: "opaque-token".to_string(),
            established_at: at,
            last_active: at,
        }
    }

    #[test]
    fn test_save_then_load() {
        let vault = temp_vault("roundtrip");
        vault.save(&record(), "correct horse").unwrap();
        assert!(vault.exists());

        let raw = std::fs::read_to_string(vault.path()).unwrap();
        assert!(!raw.contains("opaque-token"));

        let loaded: Option<SessionRecord<String>> = vault.load("correct horse").unwrap();
        assert_eq!(loaded, Some(record()));
        vault.clear().unwrap();
    }

    #[test]
    fn test_missing_vault_loads_none() {
        let vault = temp_vault("missing");
        let loaded: Option<SessionRecord<String>> = vault.load("anything").unwrap();
        assert!(loaded.is_none());
        // Clearing a missing vault is fine
        vault.clear().unwrap();
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let vault = temp_vault("wrong");
        vault.save(&record(), "right").unwrap();
        let result: Result<Option<SessionRecord<String>>> = vault.load("wrong");
        assert!(result.is_err());
        vault.clear().unwrap();
        assert!(!vault.exists());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let vault = temp_vault("tampered");
        vault.save(&record(), "pw").unwrap();

        let contents = std::fs::read_to_string(vault.path()).unwrap();
        let mut file: VaultFile = serde_json::from_str(&contents).unwrap();
        file.ciphertext[0] ^= 0xff;
        std::fs::write(vault.path(), serde_json::to_string(&file).unwrap()).unwrap();

        let result: Result<Option<SessionRecord<String>>> = vault.load("pw");
        assert!(result.is_err());
        vault.clear().unwrap();
    }
}
