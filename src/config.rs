use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;
use thiserror::Error;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "MSGDROP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "MSGDROP_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management server (health probes)
    #[arg(long, env = "MSGDROP_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for in-flight work during shutdown
    #[arg(long, env = "MSGDROP_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "MSGDROP_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Volatile, process-local storage
    Memory,
    /// One file per message in a directory
    File,
    /// Embedded SQLite database
    Sqlite,
    /// External PostgreSQL database
    Postgres,
}

#[derive(Clone, Debug, Args)]
pub struct StorageConfig {
    /// Storage backend for messages
    #[arg(long = "storage-backend", env = "MSGDROP_STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::File)]
    pub backend: StorageBackend,

    /// Database connection URL (sqlite or postgres backends)
    #[arg(long, env = "MSGDROP_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory holding message files (file backend)
    #[arg(long, env = "MSGDROP_MESSAGES_DIR", default_value = "./messages")]
    pub messages_dir: String,

    /// Maximum number of pooled database connections
    #[arg(long, env = "MSGDROP_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "MSGDROP_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Retries for read operations after a transient storage fault (0 disables)
    #[arg(long = "storage-retry-attempts", env = "MSGDROP_STORAGE_RETRY_ATTEMPTS", default_value_t = 2)]
    pub retry_attempts: usize,

    /// Initial backoff between retries in milliseconds
    #[arg(long = "storage-min-backoff-ms", env = "MSGDROP_STORAGE_MIN_BACKOFF_MS", default_value_t = 50)]
    pub min_backoff_ms: u64,

    /// Maximum backoff between retries in milliseconds
    #[arg(long = "storage-max-backoff-ms", env = "MSGDROP_STORAGE_MAX_BACKOFF_MS", default_value_t = 1000)]
    pub max_backoff_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// Maximum number of messages returned by a single list call
    #[arg(long, env = "MSGDROP_LIST_MAX_LIMIT", default_value_t = 100)]
    pub list_max_limit: i64,

    /// Restart the id sequence at 1 after a confirmed delete-all
    #[arg(long, env = "MSGDROP_RESET_SEQUENCE_ON_CLEAR", default_value_t = false)]
    pub reset_sequence_on_clear: bool,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the storage readiness check in milliseconds
    #[arg(long, env = "MSGDROP_HEALTH_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    pub storage_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "MSGDROP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "MSGDROP_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("storage backend {0:?} requires MSGDROP_DATABASE_URL")]
    MissingDatabaseUrl(StorageBackend),
    #[error("database URL does not match storage backend {0:?}")]
    UrlBackendMismatch(StorageBackend),
    #[error("list max limit must be at least 1")]
    InvalidListLimit,
    #[error("max connections must be at least 1")]
    InvalidPoolSize,
    #[error("min backoff ({min}ms) exceeds max backoff ({max}ms)")]
    InvalidBackoff { min: u64, max: u64 },
    #[error("API port and management port must differ (both {0})")]
    PortConflict(u16),
}

impl Config {
    /// Parses configuration from command-line flags and environment variables.
    pub fn load() -> Self {
        Self::parse()
    }

    /// Checks cross-field constraints that clap cannot express.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port != 0 && self.server.port == self.server.mgmt_port {
            return Err(ConfigError::PortConflict(self.server.port));
        }

        let backend = self.storage.backend;
        match backend {
            StorageBackend::Sqlite | StorageBackend::Postgres => {
                let url = self.storage.database_url.as_deref().ok_or(ConfigError::MissingDatabaseUrl(backend))?;
                let matches = if backend == StorageBackend::Postgres {
                    url.starts_with("postgres://") || url.starts_with("postgresql://")
                } else {
                    url.starts_with("sqlite:")
                };
                if !matches {
                    return Err(ConfigError::UrlBackendMismatch(backend));
                }
                if self.storage.max_connections < 1 {
                    return Err(ConfigError::InvalidPoolSize);
                }
            }
            StorageBackend::Memory | StorageBackend::File => {}
        }

        if self.storage.min_backoff_ms > self.storage.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff {
                min: self.storage.min_backoff_ms,
                max: self.storage.max_backoff_ms,
            });
        }

        if self.messaging.list_max_limit < 1 {
            return Err(ConfigError::InvalidListLimit);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["msgdrop-server"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = parse(&[]);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.messaging.list_max_limit, 100);
        assert!(!config.messaging.reset_sequence_on_clear);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sql_backend_requires_url() {
        let config = parse(&["--storage-backend", "postgres"]);
        assert_eq!(config.validate(), Err(ConfigError::MissingDatabaseUrl(StorageBackend::Postgres)));
    }

    #[test]
    fn test_url_must_match_backend() {
        let config = parse(&["--storage-backend", "sqlite", "--database-url", "postgres://localhost/db"]);
        assert_eq!(config.validate(), Err(ConfigError::UrlBackendMismatch(StorageBackend::Sqlite)));

        let config = parse(&["--storage-backend", "sqlite", "--database-url", "sqlite://messages.db"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let config = parse(&["--storage-min-backoff-ms", "500", "--storage-max-backoff-ms", "100"]);
        assert_eq!(config.validate(), Err(ConfigError::InvalidBackoff { min: 500, max: 100 }));
    }

    #[test]
    fn test_rejects_zero_list_limit() {
        let config = parse(&["--list-max-limit", "0"]);
        assert_eq!(config.validate(), Err(ConfigError::InvalidListLimit));
    }

    #[test]
    fn test_rejects_shared_ports() {
        let config = parse(&["--port", "8080", "--mgmt-port", "8080"]);
        assert_eq!(config.validate(), Err(ConfigError::PortConflict(8080)));
    }
}
