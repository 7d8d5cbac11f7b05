//! Machine-derived encryption-at-rest for the storage document.
//!
//! A random data key encrypts every item; the data key itself is wrapped
//! with a key derived (sha256 + scrypt) from machine identity material and
//! a per-document salt.

use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use scrypt::{scrypt, Params as ScryptParams};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::StorageError;

pub(crate) const STORAGE_VERSION_ENCRYPTED: u32 = 2;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const MACHINE_KEY_CONTEXT: &str = "login-callback-storage-kek-v1";
/// Production scrypt cost, also assumed for documents written before the
/// cost was recorded.
pub(crate) const DEFAULT_KDF_LOG_N: u8 = 17;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptedDocument {
    #[serde(default)]
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) encryption: Envelope,
    #[serde(default)]
    pub(crate) items: BTreeMap<String, EncryptedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default = "default_kdf_log_n")]
    pub(crate) kdf_log_n: u8,
    #[serde(default)]
    pub(crate) salt: String,
    #[serde(default)]
    pub(crate) wrapped_key_nonce: String,
    #[serde(default)]
    pub(crate) wrapped_key_ciphertext: String,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            kdf_log_n: DEFAULT_KDF_LOG_N,
            salt: String::new(),
            wrapped_key_nonce: String::new(),
            wrapped_key_ciphertext: String::new(),
        }
    }
}

fn default_kdf_log_n() -> u8 {
    DEFAULT_KDF_LOG_N
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptedItem {
    #[serde(default)]
    pub(crate) nonce: String,
    #[serde(default)]
    pub(crate) ciphertext: String,
}

pub(crate) fn looks_encrypted(value: &serde_json::Value) -> bool {
    value
        .get("encryption")
        .and_then(|inner| inner.as_object())
        .is_some()
}

/// Encrypt `items` under a fresh data key wrapped at scrypt cost `2^log_n`.
///
/// The cost is recorded in the envelope so readers derive with the same
/// parameters.
pub(crate) fn encrypt_items(
    items: &BTreeMap<String, String>,
    log_n: u8,
) -> Result<EncryptedDocument, StorageError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let kek = derive_machine_kek(&salt, log_n)?;

    let mut dek = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut dek);
    let (wrapped_nonce, wrapped_key) = encrypt_blob(&kek, &dek)?;

    let mut encrypted = BTreeMap::new();
    for (key, value) in items {
        let (nonce, ciphertext) = encrypt_blob(&dek, value.as_bytes())?;
        encrypted.insert(
            key.clone(),
            EncryptedItem {
                nonce: B64.encode(nonce),
                ciphertext: B64.encode(ciphertext),
            },
        );
    }

    Ok(EncryptedDocument {
        version: STORAGE_VERSION_ENCRYPTED,
        encryption: Envelope {
            kdf_log_n: log_n,
            salt: B64.encode(salt),
            wrapped_key_nonce: B64.encode(wrapped_nonce),
            wrapped_key_ciphertext: B64.encode(wrapped_key),
        },
        items: encrypted,
    })
}

pub(crate) fn decrypt_items(
    document: &EncryptedDocument,
) -> Result<BTreeMap<String, String>, StorageError> {
    let envelope = &document.encryption;
    let salt = decode_fixed::<SALT_LEN>(&envelope.salt, "salt")?;
    let kek = derive_machine_kek(&salt, envelope.kdf_log_n)?;
    let wrapped_nonce = decode_fixed::<NONCE_LEN>(&envelope.wrapped_key_nonce, "wrapped_key_nonce")?;
    let wrapped_key = decode_bytes(&envelope.wrapped_key_ciphertext, "wrapped_key_ciphertext")?;
    let dek_raw = decrypt_blob(&kek, &wrapped_nonce, &wrapped_key).map_err(|_| {
        StorageError::Crypto(
            "failed to decrypt stored credentials (machine identity may have changed). Run `login-callback logout` and login again."
                .to_string(),
        )
    })?;
    if dek_raw.len() != KEY_LEN {
        return Err(StorageError::Crypto(
            "invalid wrapped key material in storage document".to_string(),
        ));
    }
    let mut dek = [0u8; KEY_LEN];
    dek.copy_from_slice(&dek_raw);

    let mut items = BTreeMap::new();
    for (key, item) in &document.items {
        let text = decrypt_item(&dek, item).map_err(|_| {
            StorageError::Crypto(format!("failed to decrypt stored item `{key}`"))
        })?;
        items.insert(key.clone(), text);
    }
    Ok(items)
}

fn decrypt_item(key: &[u8; KEY_LEN], item: &EncryptedItem) -> Result<String, StorageError> {
    let nonce = decode_fixed::<NONCE_LEN>(&item.nonce, "nonce")?;
    let ciphertext = decode_bytes(&item.ciphertext, "ciphertext")?;
    let plaintext = decrypt_blob(key, &nonce, &ciphertext)?;
    String::from_utf8(plaintext)
        .map_err(|err| StorageError::Format(format!("stored item is not valid UTF-8: {err}")))
}

fn derive_machine_kek(salt: &[u8; SALT_LEN], log_n: u8) -> Result<[u8; KEY_LEN], StorageError> {
    let mut material = machine_secret_material();
    material.extend_from_slice(salt);

    let mut hashed = Sha256::new();
    hashed.update(MACHINE_KEY_CONTEXT.as_bytes());
    hashed.update(&material);
    let seed = hashed.finalize();

    let params = ScryptParams::new(log_n, 8, 1, KEY_LEN)
        .map_err(|err| StorageError::Crypto(format!("invalid key derivation parameters: {err}")))?;
    let mut key = [0u8; KEY_LEN];
    scrypt(&seed, salt, &params, &mut key)
        .map_err(|err| StorageError::Crypto(format!("failed to derive storage key: {err}")))?;
    Ok(key)
}

fn machine_secret_material() -> Vec<u8> {
    let hostname = hostname::get()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    let home = dirs::home_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let machine_id = read_machine_id().unwrap_or_default();
    format!(
        "os={}|host={}|user={}|home={}|machine_id={}",
        std::env::consts::OS,
        hostname,
        username,
        home,
        machine_id
    )
    .into_bytes()
}

fn read_machine_id() -> Option<String> {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id", "/etc/hostid"] {
        if let Ok(value) = std::fs::read_to_string(path) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn encrypt_blob(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), StorageError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| StorageError::Crypto("invalid encryption key length".to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| StorageError::Crypto("failed to encrypt storage item".to_string()))?;
    Ok((nonce.to_vec(), ciphertext))
}

fn decrypt_blob(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, StorageError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| StorageError::Crypto("invalid encryption key length".to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| StorageError::Crypto("failed to decrypt storage item".to_string()))
}

fn decode_bytes(value: &str, field: &str) -> Result<Vec<u8>, StorageError> {
    B64.decode(value).map_err(|err| {
        StorageError::Format(format!("failed to decode storage field `{field}`: {err}"))
    })
}

fn decode_fixed<const N: usize>(value: &str, field: &str) -> Result<[u8; N], StorageError> {
    let bytes = decode_bytes(value, field)?;
    if bytes.len() != N {
        return Err(StorageError::Format(format!(
            "invalid storage field `{field}` length: expected {N}, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
