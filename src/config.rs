use crate::errors::CatalogError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DATABASE: &str = "plp_bookstore";
pub const DEFAULT_COLLECTION: &str = "books";
pub const DEFAULT_APP_NAME: &str = "bookstore-catalog";
pub const DEFAULT_SERVER_SELECTION_TIMEOUT_MS: u64 = 30_000;

/// Where and how to reach the `books` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub collection: String,
    pub app_name: String,
    pub server_selection_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            server_selection_timeout_ms: DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }

    #[must_use]
    pub const fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }

    /// # Errors
    /// Returns `CatalogError::Config` for empty names or a zero port.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (label, value) in [
            ("host", &self.host),
            ("database", &self.database),
            ("collection", &self.collection),
        ] {
            if value.trim().is_empty() {
                return Err(CatalogError::Config(format!("{label} must not be empty")));
            }
        }
        if self.port == 0 {
            return Err(CatalogError::Config("port must be in 1..=65535".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Mongodb,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = CatalogError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::Mongodb),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(CatalogError::Config(format!("unknown backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub backend: Backend,
    /// JSON array of documents loaded into the memory backend before the run.
    pub seed_file: Option<PathBuf>,
    pub log: LogConfig,
}

impl AppConfig {
    /// Loads configuration from `BOOKSTORE_CONFIG` or `./bookstore.toml`, then applies
    /// `BOOKSTORE_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error if a config file exists but cannot be parsed, or an override is malformed.
    pub fn load() -> Result<Self, CatalogError> {
        let mut paths: Vec<PathBuf> = vec![];
        if let Ok(p) = std::env::var("BOOKSTORE_CONFIG") {
            paths.push(PathBuf::from(p));
        }
        if let Ok(cur) = std::env::current_dir() {
            paths.push(cur.join("bookstore.toml"));
        }
        let file = paths.into_iter().find(|p| p.exists());
        Self::load_with(file.as_deref(), |k| std::env::var(k).ok())
    }

    /// Precedence: env > file > defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or an env value is malformed.
    pub fn load_with<F>(file: Option<&Path>, env: F) -> Result<Self, CatalogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match file {
            Some(p) => {
                let s = std::fs::read_to_string(p)?;
                toml::from_str::<Self>(&s)
                    .map_err(|e| CatalogError::Config(format!("{}: {e}", p.display())))?
            }
            None => Self::default(),
        };
        if let Some(s) = env("BOOKSTORE_HOST") {
            cfg.connection.host = s;
        }
        if let Some(s) = env("BOOKSTORE_PORT") {
            cfg.connection.port = s
                .parse::<u16>()
                .map_err(|_| CatalogError::Config(format!("invalid BOOKSTORE_PORT: {s}")))?;
        }
        if let Some(s) = env("BOOKSTORE_DATABASE") {
            cfg.connection.database = s;
        }
        if let Some(s) = env("BOOKSTORE_COLLECTION") {
            cfg.connection.collection = s;
        }
        if let Some(s) = env("BOOKSTORE_BACKEND") {
            cfg.backend = s.parse()?;
        }
        if let Some(s) = env("BOOKSTORE_SEED") {
            cfg.seed_file = Some(PathBuf::from(s));
        }
        if let Some(s) = env("BOOKSTORE_LOG_DIR") {
            cfg.log.dir = Some(PathBuf::from(s));
        }
        if let Some(s) = env("BOOKSTORE_LOG_LEVEL") {
            cfg.log.level = Some(s);
        }
        if let Some(n) = env("BOOKSTORE_LOG_RETENTION").and_then(|s| s.parse::<usize>().ok()) {
            cfg.log.retention = Some(n);
        }
        Ok(cfg)
    }
}
