//! Durable string key/value storage backed by one JSON document.
//!
//! This is the process-side stand-in for browser local storage: callers
//! read and write whole string values under well-known keys, and every
//! write replaces the entire document on disk. Values are encrypted at
//! rest; legacy plaintext documents are migrated on first load.
//!
//! There is no cross-process locking. Two processes writing at the same
//! time resolve as last writer wins.

mod crypto;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StorageError;
use crypto::{
    decrypt_items, encrypt_items, looks_encrypted, EncryptedDocument, DEFAULT_KDF_LOG_N,
};

/// scrypt cost for documents written by [`LocalStorage::new`]. Unit tests
/// use a cheap cost so storage round trips stay fast.
fn default_kdf_log_n() -> u8 {
    if cfg!(test) {
        10
    } else {
        DEFAULT_KDF_LOG_N
    }
}

/// Plaintext document layout, also accepted on load for migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlainDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    items: BTreeMap<String, String>,
}

/// File-backed local storage.
#[derive(Debug)]
pub struct LocalStorage {
    path: PathBuf,
    kdf_log_n: u8,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kdf_log_n: default_kdf_log_n(),
            write_lock: Mutex::new(()),
        }
    }

    /// Override the scrypt cost (`2^log_n`) used when writing the document.
    ///
    /// Existing documents are still read with the cost recorded in them.
    pub fn with_kdf_log_n(mut self, log_n: u8) -> Self {
        self.kdf_log_n = log_n;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one item. Missing documents and missing keys both yield `None`.
    pub fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut items = load_items(&self.path, self.kdf_log_n)?;
        Ok(items.remove(key))
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
            true
        })
    }

    /// Remove one item. Returns `true` when the key existed.
    pub fn remove_item(&self, key: &str) -> Result<bool, StorageError> {
        let mut removed = false;
        self.update(|items| {
            removed = items.remove(key).is_some();
            removed
        })?;
        Ok(removed)
    }

    /// Read and deserialize a JSON-encoded item.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(text) = self.get_item(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| StorageError::Format(format!("failed to parse stored `{key}`: {err}")))
    }

    /// Serialize a value as JSON and store it, replacing any previous value.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string(value).map_err(|err| {
            StorageError::Format(format!("failed to serialize `{key}`: {err}"))
        })?;
        self.set_item(key, &text)
    }

    fn update<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut items = load_items(&self.path, self.kdf_log_n)?;
        if mutate(&mut items) {
            write_items(&self.path, &items, self.kdf_log_n)?;
        }
        Ok(())
    }
}

/// Load and decode the document, including plaintext migration.
fn load_items(path: &Path, kdf_log_n: u8) -> Result<BTreeMap<String, String>, StorageError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(StorageError::Io(err)),
    };
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
        StorageError::Format(format!(
            "failed to parse storage document `{}`: {err}",
            path.display()
        ))
    })?;

    if looks_encrypted(&value) {
        let encrypted: EncryptedDocument = serde_json::from_value(value).map_err(|err| {
            StorageError::Format(format!(
                "failed to parse encrypted storage document `{}`: {err}",
                path.display()
            ))
        })?;
        return decrypt_items(&encrypted);
    }

    let plain: PlainDocument = serde_json::from_value(value).map_err(|err| {
        StorageError::Format(format!(
            "failed to parse storage document `{}`: {err}",
            path.display()
        ))
    })?;
    if !plain.items.is_empty() {
        // Best-effort migration. If the rewrite fails, keep serving plaintext.
        if let Err(err) = write_items(path, &plain.items, kdf_log_n) {
            tracing::warn!(path = %path.display(), error = %err, "storage migration failed");
        }
    }
    Ok(plain.items)
}

/// Encrypt and persist the document with restrictive permissions.
fn write_items(
    path: &Path,
    items: &BTreeMap<String, String>,
    kdf_log_n: u8,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }
    }

    let encrypted = encrypt_items(items, kdf_log_n)?;
    let text = serde_json::to_string_pretty(&encrypted).map_err(|err| {
        StorageError::Format(format!("failed to serialize storage document: {err}"))
    })?;
    let mut options = std::fs::OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(())
}
