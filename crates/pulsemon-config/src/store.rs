//! ConfigStore — loads the config directory and serves live copies.
//!
//! `services.json` must exist; `thresholds.json` and `config.json`
//! fall back to defaults when absent. Any file that exists but does
//! not parse is a fatal error, surfaced at startup. Threshold updates
//! via the API mutate the shared handle in place and write back to
//! disk; service updates persist only (restart required).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::types::*;

/// Shared, hot-applied threshold handle. The pulse evaluator reads
/// through this on every classification.
pub type SharedThresholds = Arc<RwLock<Thresholds>>;

/// Live view of the three configuration files.
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    services: RwLock<Vec<ServiceSpec>>,
    thresholds: SharedThresholds,
    config: MonitorConfig,
}

impl ConfigStore {
    /// Load all configuration from `dir`. Missing `services.json` or
    /// any unparseable file is an error.
    pub fn load(dir: &Path) -> ConfigResult<Self> {
        let services_path = dir.join("services.json");
        if !services_path.exists() {
            return Err(ConfigError::NotFound(services_path));
        }
        let services_file: ServicesFile = read_json(&services_path)?;
        validate_services(&services_file.services)?;

        let thresholds: Thresholds = read_json_or_default(&dir.join("thresholds.json"))?;
        let config: MonitorConfig = read_json_or_default(&dir.join("config.json"))?;

        debug!(
            dir = %dir.display(),
            services = services_file.services.len(),
            "configuration loaded"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            services: RwLock::new(services_file.services),
            thresholds: Arc::new(RwLock::new(thresholds)),
            config,
        })
    }

    /// Snapshot of all declared services.
    pub fn services(&self) -> Vec<ServiceSpec> {
        self.services.read().clone()
    }

    /// Look up one service by name.
    pub fn service(&self, name: &str) -> Option<ServiceSpec> {
        self.services.read().iter().find(|s| s.name == name).cloned()
    }

    /// The shared threshold handle (hot-applied by the evaluator).
    pub fn thresholds(&self) -> SharedThresholds {
        self.thresholds.clone()
    }

    /// Current thresholds by value.
    pub fn thresholds_snapshot(&self) -> Thresholds {
        self.thresholds.read().clone()
    }

    /// The daemon configuration (`config.json`).
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Validate and persist a replacement service list. The scheduler
    /// does not hot-reload intervals; callers surface "restart
    /// required" to the operator.
    pub fn replace_services(&self, services: Vec<ServiceSpec>) -> ConfigResult<()> {
        validate_services(&services)?;
        write_json(
            &self.dir.join("services.json"),
            &ServicesFile {
                services: services.clone(),
            },
        )?;
        *self.services.write() = services;
        Ok(())
    }

    /// Apply new latency bounds and persist `thresholds.json`.
    ///
    /// `healthy` and `warning` replace the respective `max` bounds;
    /// `degraded` is stored as the critical floor.
    pub fn update_thresholds(&self, healthy: u64, warning: u64, degraded: u64) -> ConfigResult<()> {
        let updated = {
            let mut t = self.thresholds.write();
            t.default.healthy.max = healthy;
            t.default.warning.max = warning;
            t.default.critical.min = Some(degraded);
            t.clone()
        };
        write_json(&self.dir.join("thresholds.json"), &updated)
    }
}

/// Reject service lists the monitor cannot run.
pub fn validate_services(services: &[ServiceSpec]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for spec in services {
        if spec.name.trim().is_empty() {
            return Err(ConfigError::Validation("service name is empty".into()));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate service name: {}",
                spec.name
            )));
        }
        if !spec.url.starts_with("http://") && !spec.url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "service {} has a non-http url: {}",
                spec.name, spec.url
            )));
        }
        if spec.checks.is_empty() {
            return Err(ConfigError::Validation(format!(
                "service {} declares no checks",
                spec.name
            )));
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> ConfigResult<T> {
    if !path.exists() {
        warn!(path = %path.display(), "config file absent, using defaults");
        return Ok(T::default());
    }
    read_json(path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> ConfigResult<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_services(dir: &Path, body: &str) {
        std::fs::write(dir.join("services.json"), body).unwrap();
    }

    const MINIMAL: &str = r#"{
        "services": [{
            "name": "payments",
            "url": "https://payments.internal/graphql",
            "tier": "critical",
            "checks": [{"name": "ping", "strategy": "basic"}]
        }]
    }"#;

    #[test]
    fn load_requires_services_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn load_defaults_optional_files() {
        let dir = tempfile::tempdir().unwrap();
        write_services(dir.path(), MINIMAL);

        let store = ConfigStore::load(dir.path()).unwrap();
        assert_eq!(store.services().len(), 1);
        assert_eq!(store.config().server.port, 8080);
        assert_eq!(store.thresholds_snapshot(), Thresholds::default());
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        write_services(dir.path(), "{not json");
        let err = ConfigStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_rejects_invalid_thresholds_file() {
        let dir = tempfile::tempdir().unwrap();
        write_services(dir.path(), MINIMAL);
        std::fs::write(dir.path().join("thresholds.json"), "[]").unwrap();
        let err = ConfigStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn service_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_services(dir.path(), MINIMAL);
        let store = ConfigStore::load(dir.path()).unwrap();

        assert!(store.service("payments").is_some());
        assert!(store.service("nope").is_none());
    }

    #[test]
    fn replace_services_persists() {
        let dir = tempfile::tempdir().unwrap();
        write_services(dir.path(), MINIMAL);
        let store = ConfigStore::load(dir.path()).unwrap();

        let mut services = store.services();
        services[0].name = "billing".to_string();
        store.replace_services(services).unwrap();

        // In-memory view updated.
        assert!(store.service("billing").is_some());
        // And written through to disk.
        let reloaded = ConfigStore::load(dir.path()).unwrap();
        assert!(reloaded.service("billing").is_some());
    }

    #[test]
    fn replace_services_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write_services(dir.path(), MINIMAL);
        let store = ConfigStore::load(dir.path()).unwrap();

        let mut services = store.services();
        services.push(services[0].clone());
        let err = store.replace_services(services).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn validation_rejects_bad_specs() {
        let base = ServiceSpec {
            name: "ok".into(),
            url: "https://x".into(),
            tier: Tier::Standard,
            heartbeat_interval: None,
            checks: vec![CheckSpec {
                name: "ping".into(),
                strategy: StrategyKind::Basic,
                query: None,
                variables: None,
                timeout: 10_000,
            }],
            auth_token: None,
        };

        let mut empty_name = base.clone();
        empty_name.name = "  ".into();
        assert!(validate_services(&[empty_name]).is_err());

        let mut bad_url = base.clone();
        bad_url.url = "ftp://x".into();
        assert!(validate_services(&[bad_url]).is_err());

        let mut no_checks = base.clone();
        no_checks.checks.clear();
        assert!(validate_services(&[no_checks]).is_err());

        assert!(validate_services(&[base]).is_ok());
    }

    #[test]
    fn update_thresholds_hot_applies_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        write_services(dir.path(), MINIMAL);
        let store = ConfigStore::load(dir.path()).unwrap();
        let handle = store.thresholds();

        store.update_thresholds(100, 300, 900).unwrap();

        // Hot-applied through the shared handle.
        assert_eq!(handle.read().healthy_max(), 100);
        assert_eq!(handle.read().warning_max(), 300);
        // Persisted.
        let reloaded = ConfigStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.thresholds_snapshot().healthy_max(), 100);
        assert_eq!(
            reloaded.thresholds_snapshot().default.critical.min,
            Some(900)
        );
    }
}
