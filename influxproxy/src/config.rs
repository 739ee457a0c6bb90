use influx::BackendConfig;
use metric_gateway::config::Config as GatewayConfig;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            sentry_dsn: None,
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    /// Loads and validates the configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        self.backend.validate()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid gateway config: {0}")]
    Gateway(#[from] metric_gateway::config::ValidationError),
    #[error("invalid backend config: {0}")]
    Backend(#[from] influx::config::ValidationError),
}

fn default_prefix() -> String {
    "influxproxy".into()
}

fn default_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metric_gateway::config::AllowFrom;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            gateway:
                listener:
                    host: 127.0.0.1
                    port: 8765
                preflight_expiration: 120
                tenants:
                    acme:
                        public_key: k1
                        allow_from: ["https://acme.example"]
                        udp_port: 8090
                    open:
                        public_key: k2
                        allow_from: "*"
            backend:
                host: influxdb.internal
                port: 8086
                username: admin
                password: hunter2
                udp_port: 8089
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example/1
                level: warn
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.gateway.preflight_expiration, 120);
        assert_eq!(config.gateway.tenants.len(), 2);
        assert_eq!(config.gateway.tenants["open"].allow_from, AllowFrom::Any);
        assert_eq!(config.backend.host, "influxdb.internal");
        assert_eq!(config.backend.username, "admin");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "influxproxy");
        assert_eq!(config.common.logging.level, "warn");
        assert!(config.common.logging.sentry_dsn.is_some());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let yaml = r#"
            gateway:
                tenants:
                    acme: {public_key: k1, allow_from: "*"}
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.gateway.listener.port, 8765);
        assert_eq!(config.backend, BackendConfig::default());
        assert!(config.common.metrics.is_none());
        assert_eq!(config.common.logging.level, "info");
        assert!(config.common.logging.sentry_dsn.is_none());
    }

    #[test]
    fn example_config_is_valid() {
        let tmp = write_tmp_file(include_str!("../example_config.yaml"));
        let config = Config::from_file(tmp.path()).expect("load example config");
        assert_eq!(config.gateway.tenants["acme"].udp_port, Some(8090));
    }

    #[test]
    fn invalid_configs() {
        let tmp = write_tmp_file("gateway:\n    tenants: {}\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::Gateway(
                metric_gateway::config::ValidationError::NoTenants
            ))
        ));

        let tmp = write_tmp_file(
            "gateway:\n    tenants:\n        acme: {public_key: k1, allow_from: \"*\"}\nbackend:\n    udp_payload_bytes: 0\n",
        );
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::Backend(_))
        ));

        let tmp = write_tmp_file("backend: {}\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/influxproxy.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}
