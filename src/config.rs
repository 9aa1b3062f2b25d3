use std::str::FromStr;

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreBackend {
    Firestore,
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            other => anyhow::bail!("unknown store backend `{other}`"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub base_url: String,
    pub project_id: Option<String>,
    pub database_id: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub page_size: u32,
    /// `None` leaves requests unbounded.
    pub timeout_secs: Option<u64>,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    pub backend: StoreBackend,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub emulator: EmulatorConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let backend = match non_empty("STORE_BACKEND") {
            Some(v) => v.parse().context("STORE_BACKEND")?,
            None => StoreBackend::Firestore,
        };
        let page_size = match non_empty("STORE_PAGE_SIZE") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("STORE_PAGE_SIZE must be a positive integer, got `{v}`"))?,
            None => 300,
        };
        let timeout_secs = match non_empty("STORE_TIMEOUT_SECS") {
            Some(v) => Some(
                v.parse::<u64>()
                    .with_context(|| format!("STORE_TIMEOUT_SECS must be an integer, got `{v}`"))?,
            ),
            None => None,
        };
        let store = StoreConfig {
            backend,
            base_url: non_empty("STORE_BASE_URL")
                .unwrap_or_else(|| "https://firestore.googleapis.com".into()),
            project_id: non_empty("STORE_PROJECT_ID"),
            database_id: non_empty("STORE_DATABASE_ID").unwrap_or_else(|| "(default)".into()),
            api_key: non_empty("STORE_API_KEY"),
            collection: non_empty("STORE_COLLECTION").unwrap_or_else(|| "users".into()),
            page_size,
            timeout_secs,
            database_url: non_empty("DATABASE_URL"),
        };

        let port = match non_empty("APP_PORT") {
            Some(v) => v
                .parse::<u16>()
                .with_context(|| format!("APP_PORT must be a port number, got `{v}`"))?,
            None => 8080,
        };
        let emulator = EmulatorConfig {
            backend: match non_empty("EMULATOR_BACKEND") {
                Some(v) => v.parse().context("EMULATOR_BACKEND")?,
                None => StoreBackend::Memory,
            },
            host: non_empty("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
        };

        Ok(Self { store, emulator })
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_target_the_users_collection() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Firestore);
        assert_eq!(cfg.store.collection, "users");
        assert_eq!(cfg.store.database_id, "(default)");
        assert_eq!(cfg.store.page_size, 300);
        assert_eq!(cfg.store.timeout_secs, None);
        assert_eq!(cfg.emulator.backend, StoreBackend::Memory);
        assert_eq!(cfg.emulator.port, 8080);
    }

    #[test]
    fn reads_overrides() {
        let cfg = load(&[
            ("STORE_BACKEND", "Postgres"),
            ("STORE_PROJECT_ID", "demo"),
            ("STORE_TIMEOUT_SECS", "15"),
            ("STORE_API_KEY", "  "),
            ("APP_PORT", "9090"),
        ])
        .unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Postgres);
        assert_eq!(cfg.store.project_id.as_deref(), Some("demo"));
        assert_eq!(cfg.store.timeout_secs, Some(15));
        assert_eq!(cfg.store.api_key, None);
        assert_eq!(cfg.emulator.port, 9090);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[("STORE_BACKEND", "mongo")]).is_err());
        assert!(load(&[("STORE_PAGE_SIZE", "0")]).is_err());
        assert!(load(&[("STORE_TIMEOUT_SECS", "soon")]).is_err());

        let err = load(&[("APP_PORT", "80a")]).unwrap_err();
        assert!(format!("{err:#}").contains("APP_PORT"));
        assert!(load(&[("APP_PORT", "70000")]).is_err());
    }
}
