use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No Flipr ids configured")]
    NoFliprIds,
}

/// Stored configuration for one Flipr account: the credentials plus the
/// devices to poll.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigEntry {
    pub email: String,
    pub password: String,
    /// Comma-separated Flipr serials, kept as entered.
    pub flipr_ids: String,
}

impl ConfigEntry {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config entry from {}", path.display());
        let raw = fs::read_to_string(path)?;
        let entry: ConfigEntry = serde_json::from_str(&raw)?;
        if entry.flipr_ids().is_empty() {
            return Err(ConfigError::NoFliprIds);
        }
        Ok(entry)
    }

    /// The configured device serials, one entry per id.
    pub fn flipr_ids(&self) -> Vec<String> {
        self.flipr_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn entry(flipr_ids: &str) -> ConfigEntry {
        ConfigEntry {
            email: "pool@example.com".into(),
            password: "hunter2".into(),
            flipr_ids: flipr_ids.into(),
        }
    }

    #[test]
    fn splits_comma_separated_ids() {
        assert_eq!(entry("AB256C").flipr_ids(), vec!["AB256C"]);
        assert_eq!(
            entry("AB256C, CD123E ,EF789G,").flipr_ids(),
            vec!["AB256C", "CD123E", "EF789G"]
        );
        assert!(entry("  ").flipr_ids().is_empty());
    }

    #[test]
    fn loads_entry_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"email": "pool@example.com", "password": "hunter2", "flipr_ids": "AB256C,CD123E"}}"#
        )
        .unwrap();

        let entry = ConfigEntry::load(file.path()).unwrap();
        assert_eq!(entry.email, "pool@example.com");
        assert_eq!(entry.flipr_ids(), vec!["AB256C", "CD123E"]);
    }

    #[test]
    fn rejects_entry_without_ids() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"email": "pool@example.com", "password": "hunter2", "flipr_ids": ""}}"#
        )
        .unwrap();

        assert!(matches!(
            ConfigEntry::load(file.path()),
            Err(ConfigError::NoFliprIds)
        ));
    }
}
