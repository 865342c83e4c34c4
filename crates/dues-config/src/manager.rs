use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use crate::{Config, ConfigError, NotificationSettings};

const CONFIG_FILE: &str = "config.json";

/// Reads and writes the engine's `config.json`.
///
/// Both directions pass through [`normalize`], so the engine never sees
/// blank keywords, duplicate source apps or a blank log filter.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// `<base>/config/config.json`
    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        let config_dir = base.join("config");
        fs::create_dir_all(&config_dir)?;
        Ok(Self::new(config_dir.join(CONFIG_FILE)))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// A missing file yields the default configuration.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let config = match fs::read_to_string(&self.config_path) {
            Ok(data) => serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(normalize(config))
    }

    /// Writes a sibling `.tmp` file and renames it over the config.
    /// Returns the configuration as stored.
    pub fn save(&self, config: &Config) -> Result<Config, ConfigError> {
        let config = normalize(config.clone());
        let json = serde_json::to_string_pretty(&config)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.config_path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.config_path)?;
        Ok(config)
    }

    /// Loads, applies `edit` and saves.
    pub fn update(&self, edit: impl FnOnce(&mut Config)) -> Result<Config, ConfigError> {
        let mut config = self.load()?;
        edit(&mut config);
        self.save(&config)
    }
}

/// Trims every list entry, drops blanks and duplicates, and restores
/// defaults for an empty keyword list or log filter.
pub fn normalize(mut config: Config) -> Config {
    let log_filter = config.log_filter.trim();
    config.log_filter = if log_filter.is_empty() {
        Config::default().log_filter
    } else {
        log_filter.to_string()
    };

    let NotificationSettings {
        deposit_keywords,
        allowed_sources,
        ..
    } = &mut config.notification;
    *deposit_keywords = distinct_trimmed(deposit_keywords);
    if deposit_keywords.is_empty() {
        *deposit_keywords = NotificationSettings::default().deposit_keywords;
    }
    *allowed_sources = distinct_trimmed(allowed_sources);
    config
}

fn distinct_trimmed(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty() && seen.insert(value.to_string()))
        .map(str::to_string)
        .collect()
}
