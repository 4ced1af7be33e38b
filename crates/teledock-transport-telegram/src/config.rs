//! Telegram transport settings.

use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Cooldown period (seconds) between log reports of the same unauthorized user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

/// Errors found while loading or validating settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// A config source could not be read or deserialized
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// `TELEDOCK_TOKEN` is missing or empty
    #[error("TELEDOCK_TOKEN is not set")]
    MissingToken,
    /// An entry of `TELEDOCK_SUPERADMINS` is not a user id
    #[error("invalid user id in TELEDOCK_SUPERADMINS: {0:?}")]
    InvalidAdminId(String),
    /// `TELEDOCK_SUPERADMINS` lists nobody
    #[error("TELEDOCK_SUPERADMINS must list at least one user id")]
    NoAdmins,
}

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    #[serde(default)]
    pub token: String,
    /// Comma-, semicolon- or space-separated list of admin user IDs.
    #[serde(rename = "superadmins")]
    pub superadmins_str: Option<String>,
    /// Seconds between log reports of the same unauthorized user.
    #[serde(default = "default_unauthorized_cooldown")]
    pub unauthorized_cooldown_secs: u64,
}

const fn default_unauthorized_cooldown() -> u64 {
    UNAUTHORIZED_COOLDOWN_SECS
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        teledock_core::config::build_config()?.try_deserialize()
    }

    /// Parse the admin list.
    ///
    /// A single bad entry rejects the whole list.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidAdminId`] for an unparsable entry and
    /// [`SettingsError::NoAdmins`] when the list is missing or empty.
    pub fn admins(&self) -> Result<HashSet<i64>, SettingsError> {
        let admins = self
            .superadmins_str
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|id| {
                id.parse::<i64>()
                    .map_err(|_| SettingsError::InvalidAdminId(id.to_string()))
            })
            .collect::<Result<HashSet<i64>, _>>()?;

        if admins.is_empty() {
            return Err(SettingsError::NoAdmins);
        }
        Ok(admins)
    }
}

/// Validated settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
    /// Users allowed to run container commands.
    pub admins: Arc<HashSet<i64>>,
}

impl BotSettings {
    /// Validate raw settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or the admin list is invalid.
    pub fn new(telegram: TelegramSettings) -> Result<Self, SettingsError> {
        if telegram.token.trim().is_empty() {
            return Err(SettingsError::MissingToken);
        }
        let admins = telegram.admins()?;
        Ok(Self {
            telegram: Arc::new(telegram),
            admins: Arc::new(admins),
        })
    }

    /// Load from config files and the environment, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or validation fails.
    pub fn load() -> Result<Self, SettingsError> {
        Self::new(TelegramSettings::new()?)
    }
}
