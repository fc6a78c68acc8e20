//! Secret decryption for receiver secure settings.
//!
//! Notifiers never see the decrypter directly. The registry hands each
//! channel builder a `DecryptFn`, which resolves a secure key once, at
//! construction time.

use crate::core::SecureSettings;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecryptError {
    #[error("secret is not valid UTF-8")]
    InvalidUtf8,

    #[error("failed to decrypt secret: {0}")]
    Cipher(String),
}

/// Decrypts a single secure settings value.
pub trait SecretsDecrypter: Send + Sync {
    fn decrypt(&self, payload: &[u8]) -> Result<String, DecryptError>;
}

/// Treats secure values as already-decrypted UTF-8. Used when secrets come
/// from a local config file or the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextDecrypter;

impl SecretsDecrypter for PlaintextDecrypter {
    fn decrypt(&self, payload: &[u8]) -> Result<String, DecryptError> {
        String::from_utf8(payload.to_vec()).map_err(|_| DecryptError::InvalidUtf8)
    }
}

/// `decrypt(secure, key, fallback) -> value`
pub type DecryptFn = Arc<dyn Fn(&SecureSettings, &str, &str) -> String + Send + Sync>;

/// Builds a `DecryptFn` around a decrypter.
///
/// The secure value wins when the key is present. Otherwise, or when the
/// secure value cannot be decrypted, the plaintext fallback is returned.
pub fn decrypt_fn(decrypter: Arc<dyn SecretsDecrypter>) -> DecryptFn {
    Arc::new(move |secure: &SecureSettings, key: &str, fallback: &str| {
        let Some(payload) = secure.get(key) else {
            return fallback.to_string();
        };
        match decrypter.decrypt(payload) {
            Ok(value) => value,
            Err(e) => {
                error!(key, error = %e, "Failed to decrypt secure setting, using fallback");
                fallback.to_string()
            }
        }
    })
}
