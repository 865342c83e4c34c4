use std::path::PathBuf;

use dues_domain::{BankAccount, DifferentialSettings};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

const APP_DIR: &str = "club-dues";
pub const DEFAULT_LOG_FILTER: &str = "club_dues=info,dues_core=info";

/// Engine settings persisted as `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Root of the club snapshot tree. `None` resolves to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_root: Option<PathBuf>,
    #[serde(default = "Config::default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub notification: NotificationSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<BankAccount>,
    #[serde(default)]
    pub differential: DifferentialSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: None,
            log_filter: Self::default_log_filter(),
            notification: NotificationSettings::default(),
            bank_account: None,
            differential: DifferentialSettings::default(),
        }
    }
}

impl Config {
    fn default_log_filter() -> String {
        DEFAULT_LOG_FILTER.to_string()
    }

    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = Some(root.into());
        self
    }

    pub fn resolve_data_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_root {
            Some(root) => Ok(root.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(ConfigError::NoDataDir),
        }
    }
}

/// Controls the deposit notification listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "NotificationSettings::default_keywords")]
    pub deposit_keywords: Vec<String>,
    /// Source apps whose notifications are read. Empty accepts all.
    #[serde(default)]
    pub allowed_sources: Vec<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            deposit_keywords: Self::default_keywords(),
            allowed_sources: Vec::new(),
        }
    }
}

impl NotificationSettings {
    fn default_keywords() -> Vec<String> {
        vec!["입금".to_string()]
    }
}
