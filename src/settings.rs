use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{Result, SessionizeError};
use crate::sessionization::config::{
    default_max_workers, FailurePolicy, SessionizerConfig, DEFAULT_TIMEOUT_MINUTES,
};

pub const TIMEOUT_ENV: &str = "SESSIONIZER_TIMEOUT_SECS";
pub const MAX_WORKERS_ENV: &str = "SESSIONIZER_MAX_WORKERS";

/// On-disk settings, e.g.
/// `{ "timeoutSecs": 1800, "failurePolicy": "isolate", "maxWorkers": 4,
/// "detectFragmentedEntities": false }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsFile {
    pub timeout_secs: i64,
    pub failure_policy: FailurePolicy,
    pub max_workers: Option<usize>,
    pub detect_fragmented_entities: bool,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_MINUTES * 60,
            failure_policy: FailurePolicy::default(),
            max_workers: None,
            detect_fragmented_entities: false,
        }
    }
}

impl SettingsFile {
    /// Read settings from `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    /// Apply `SESSIONIZER_*` environment overrides.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(TIMEOUT_ENV) {
            self.timeout_secs = value.trim().parse().map_err(|_| {
                SessionizeError::invalid_config(format!("{TIMEOUT_ENV} is not an integer: {value}"))
            })?;
        }
        if let Some(value) = lookup(MAX_WORKERS_ENV) {
            let workers = value.trim().parse().map_err(|_| {
                SessionizeError::invalid_config(format!(
                    "{MAX_WORKERS_ENV} is not a positive integer: {value}"
                ))
            })?;
            self.max_workers = Some(workers);
        }
        Ok(self)
    }

    /// Build a validated pipeline configuration.
    pub fn into_config(self) -> Result<SessionizerConfig> {
        let timeout = Duration::try_seconds(self.timeout_secs).ok_or_else(|| {
            SessionizeError::invalid_config(format!("timeout out of range: {}s", self.timeout_secs))
        })?;
        let config = SessionizerConfig {
            timeout,
            failure_policy: self.failure_policy,
            max_workers: self.max_workers.unwrap_or_else(default_max_workers),
            detect_fragmented_entities: self.detect_fragmented_entities,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sessionizer-{}-{name}", std::process::id()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = SettingsFile::load(&temp_path("does-not-exist.json")).unwrap();
        assert_eq!(settings, SettingsFile::default());
        let config = settings.into_config().unwrap();
        assert_eq!(config.timeout, Duration::minutes(30));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_path("partial.json");
        fs::write(&path, r#"{ "failurePolicy": "failFast" }"#).unwrap();

        let settings = SettingsFile::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.failure_policy, FailurePolicy::FailFast);
        assert_eq!(settings.timeout_secs, 1800);
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("saved.json");
        let settings = SettingsFile {
            timeout_secs: 600,
            failure_policy: FailurePolicy::Isolate,
            max_workers: Some(2),
            detect_fragmented_entities: true,
        };
        settings.save(&path).unwrap();
        let loaded = SettingsFile::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, settings);
        let config = loaded.into_config().unwrap();
        assert_eq!(config.timeout, Duration::minutes(10));
        assert_eq!(config.max_workers, 2);
        assert!(config.detect_fragmented_entities);
    }

    #[test]
    fn malformed_file_is_a_settings_error() {
        let path = temp_path("malformed.json");
        fs::write(&path, "{ not json").unwrap();
        let err = SettingsFile::load(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert!(matches!(err, SessionizeError::Settings(_)));
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> =
            HashMap::from([(TIMEOUT_ENV, "90"), (MAX_WORKERS_ENV, " 3 ")]);
        let settings = SettingsFile::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.timeout_secs, 90);
        assert_eq!(settings.max_workers, Some(3));
    }

    #[test]
    fn bad_override_is_invalid_configuration() {
        let err = SettingsFile::default()
            .apply_overrides(|key| (key == TIMEOUT_ENV).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, SessionizeError::InvalidConfiguration { .. }));
    }

    #[test]
    fn negative_timeout_fails_validation() {
        let settings = SettingsFile {
            timeout_secs: -5,
            ..SettingsFile::default()
        };
        assert!(settings.into_config().is_err());
    }
}
