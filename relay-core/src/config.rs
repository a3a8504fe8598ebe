use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Outbound delivery and loop pacing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeliveryConfig {
    /// `"http"` posts to `endpoint`; `"simulate"` only records the message.
    pub backend: String,
    /// URL template; `{target}` is replaced with the session target.
    pub endpoint: String,
    pub request_timeout_seconds: u64,
    /// Granularity at which a sleeping loop re-reads its session status.
    pub poll_interval_ms: u64,
    /// Number of log entries returned by status queries.
    pub log_display_cap: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            backend: "simulate".to_string(),
            endpoint: String::new(),
            request_timeout_seconds: 30,
            poll_interval_ms: 1000,
            log_display_cap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub admin_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            admin_file: "admin.json".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn upload_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.upload_dir).into_owned())
    }

    pub fn admin_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.admin_file).into_owned())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdminConfig {
    /// Written (hashed) to the admin file the first time the server starts.
    pub initial_password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            initial_password: "relay-admin".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }

    /// Config suitable for tests: in-process database url and fast polling.
    pub fn for_database(url: &str) -> Self {
        Self {
            service: ServiceConfig {
                socket_path: "/tmp/relay.sock".to_string(),
                log_level: "info".to_string(),
            },
            database: DatabaseConfig {
                url: url.to_string(),
                max_connections: 4,
            },
            http: HttpConfig::default(),
            delivery: DeliveryConfig::default(),
            storage: StorageConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}
