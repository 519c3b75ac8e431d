use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use zeroize::Zeroizing;

/// Settings of a software element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementConfig {
    pub local_pool_size: usize,
    pub foreign_pool_size: usize,
    /// JSON snapshot written after every persistent change
    pub state_path: Option<PathBuf>,
    /// Hex encoded 32-byte key of the shared lock domain
    pub shared_key_hex: Option<String>,
    pub model: String,
    pub firmware_version: String,
    pub serial_number: String,
}

impl Default for ElementConfig {
    fn default() -> Self {
        Self {
            local_pool_size: 512,
            foreign_pool_size: 128,
            state_path: None,
            shared_key_hex: None,
            model: "HSW-1".to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            serial_number: "SW-00000000".to_string(),
        }
    }
}

impl ElementConfig {
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn with_shared_key(mut self, key: &[u8; 32]) -> Self {
        self.shared_key_hex = Some(hex::encode(key));
        self
    }

    /// Decode the configured shared key, if any
    pub fn shared_key(&self) -> Result<Option<Zeroizing<[u8; 32]>>, ConfigError> {
        let Some(key_hex) = &self.shared_key_hex else {
            return Ok(None);
        };
        let bytes = Zeroizing::new(hex::decode(key_hex).map_err(|e| ConfigError::SharedKey {
            reason: e.to_string(),
        })?);
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ConfigError::SharedKey {
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            })?;
        Ok(Some(Zeroizing::new(key)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_pool_size == 0 {
            return Err(ConfigError::PoolSize {
                keyring: "local".to_string(),
            });
        }
        if self.foreign_pool_size == 0 {
            return Err(ConfigError::PoolSize {
                keyring: "foreign".to_string(),
            });
        }
        self.shared_key().map(|_| ())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid shared key: {reason}")]
    SharedKey { reason: String },

    #[error("The {keyring} pool must hold at least one slot")]
    PoolSize { keyring: String },
}
