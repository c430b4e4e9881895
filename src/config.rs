//! Configuration manager for Tessera.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to RabbitMQ event delivery.
    #[serde(skip_serializing)]
    pub broker: Option<Broker>,
    /// Related to OpenTelemetry and Prometheus.
    #[serde(default)]
    pub telemetry: Telemetry,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// RabbitMQ configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broker {
    /// amqp://hostname:(?port) for RabbitMQ instance.
    pub address: String,
    /// RabbitMQ default vhost.
    pub vhost: Option<String>,
    /// RabbitMQ username to access queue.
    pub username: String,
    /// RabbitMQ password to access queue.
    pub password: String,
    /// Max channel connections.
    pub pool: Option<u16>,
    /// Queue carrying domain events.
    pub queue: String,
    /// Unacknowledged deliveries per consumer.
    pub prefetch: Option<u16>,
}

/// Telemetry configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// OTLP endpoint receiving traces and logs.
    pub otlp_endpoint: Option<String>,
    /// Address of the Prometheus scrape listener, such as `0.0.0.0:9000`.
    pub prometheus: Option<String>,
}

/// Why [`Configuration::read`] fell back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    Unreadable,
    Malformed,
}

impl Fallback {
    const fn message(self) -> &'static str {
        match self {
            Fallback::Unreadable => "`config.yaml` file cannot be opened",
            Fallback::Malformed => "`config.yaml` file is malformed",
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Application version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing or malformed file falls back to the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the broker address is not a valid URL.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(
                                self.error(Fallback::Malformed, err),
                            ));
                        },
                    };

                // set app version.
                config.version = VERSION.to_owned();
                config.path = file_path.clone();

                if let Some(broker) = &config.broker {
                    Url::parse(&broker.address)?;
                }

                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(Fallback::Unreadable, err))),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, reason: Fallback, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "{}", reason.message());
        Self {
            version: VERSION.to_owned(),
            path: self.path.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_config() {
        let path = write_config(
            "tessera-config-test.yaml",
            r#"
name: tessera
postgres:
  address: localhost:5432
  database: social
broker:
  address: amqp://localhost:5672
  username: guest
  password: guest
  queue: events
telemetry:
  prometheus: 0.0.0.0:9000
"#,
        );

        let config = Configuration::default().path(path).read().unwrap();
        assert_eq!(config.name, "tessera");
        assert_eq!(config.version(), VERSION);
        assert_eq!(
            config.postgres.as_ref().unwrap().database.as_deref(),
            Some("social")
        );
        assert_eq!(config.broker.as_ref().unwrap().queue, "events");
        assert_eq!(config.telemetry.prometheus.as_deref(), Some("0.0.0.0:9000"));
        assert!(config.telemetry.otlp_endpoint.is_none());
    }

    #[test]
    fn test_invalid_broker_address() {
        let path = write_config(
            "tessera-config-invalid.yaml",
            r#"
name: tessera
broker:
  address: "not a url"
  username: guest
  password: guest
  queue: events
"#,
        );

        assert!(Configuration::default().path(path).read().is_err());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let path = write_config("tessera-config-malformed.yaml", "name: [");

        let config = Configuration::default().path(path).read().unwrap();
        assert!(config.name.is_empty());
        assert!(config.postgres.is_none());
        assert_eq!(config.version(), VERSION);
    }

    #[test]
    fn test_fallback_reasons_are_distinct() {
        assert!(Fallback::Malformed.message().contains("malformed"));
        assert!(!Fallback::Unreadable.message().contains("malformed"));
    }
}
