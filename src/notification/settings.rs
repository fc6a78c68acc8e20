//! Typed access to a receiver's opaque settings document.
//!
//! Each channel builds its config by enumerating its fields through a
//! `SettingsReader`: required fields first, in the order their errors must be
//! reported, then optional fields and secrets.

use super::error::{ConfigError, ValidationError};
use crate::core::{NotificationChannelConfig, SecureSettings};
use crate::secrets::DecryptFn;
use serde_json::{Map, Value};

pub struct SettingsReader<'a> {
    settings: Option<&'a Map<String, Value>>,
    secure: &'a SecureSettings,
    decrypt: &'a DecryptFn,
}

impl<'a> SettingsReader<'a> {
    pub fn new(
        config: &'a NotificationChannelConfig,
        decrypt: &'a DecryptFn,
    ) -> Result<Self, ConfigError> {
        let settings = match &config.settings {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => return Err(ConfigError::NotAnObject),
        };
        Ok(Self {
            settings,
            secure: &config.secure_settings,
            decrypt,
        })
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.settings.and_then(|map| map.get(key))
    }

    /// Returns the value as a string. Numbers and booleans are stringified,
    /// anything else (including a missing key) is empty.
    pub fn string(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// Like `string`, but substitutes `default` for an empty value.
    pub fn string_or(&self, key: &str, default: &str) -> String {
        let value = self.string(key);
        if value.is_empty() {
            default.to_string()
        } else {
            value
        }
    }

    /// A required, non-blank string. `label` names the field in the error.
    pub fn required(&self, key: &str, label: &'static str) -> Result<String, ConfigError> {
        let value = self.string(key);
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(label));
        }
        Ok(value)
    }

    /// Resolves a secret: decrypted secure value, else the plaintext
    /// setting, else empty.
    pub fn secret(&self, key: &str) -> String {
        (self.decrypt)(self.secure, key, &self.string(key))
    }

    pub fn required_secret(&self, key: &str, label: &'static str) -> Result<String, ConfigError> {
        let value = self.secret(key);
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(label));
        }
        Ok(value)
    }

    /// Accepts JSON booleans and `"true"`/`"false"` strings. Missing is false.
    pub fn bool(&self, key: &'static str) -> Result<bool, ValidationError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) if s.is_empty() => Ok(false),
            Some(Value::String(s)) => s
                .parse::<bool>()
                .map_err(|_| ValidationError::invalid_value(key, s)),
            Some(other) => Err(ValidationError::invalid_value(key, &other.to_string())),
        }
    }

    /// Accepts non-negative JSON integers and numeric strings. Missing is `None`.
    pub fn u64(&self, key: &'static str) -> Result<Option<u64>, ValidationError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| ValidationError::invalid_value(key, &n.to_string())),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ValidationError::invalid_value(key, s)),
            Some(other) => Err(ValidationError::invalid_value(key, &other.to_string())),
        }
    }

    /// An enumerated string. Empty selects `default`; anything outside
    /// `allowed` is rejected.
    pub fn one_of(
        &self,
        key: &'static str,
        allowed: &[&str],
        default: &str,
    ) -> Result<String, ValidationError> {
        let value = self.string(key);
        if value.is_empty() {
            return Ok(default.to_string());
        }
        if allowed.contains(&value.as_str()) {
            Ok(value)
        } else {
            Err(ValidationError::invalid_value(key, &value))
        }
    }

    /// Splits a comma separated list, dropping blanks.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.string(key)
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}
