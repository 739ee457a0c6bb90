use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("backend {0} cannot be 0")]
    InvalidPort(&'static str),

    #[error("backend udp_payload_bytes cannot be 0")]
    InvalidPayloadSize,
}

/// Connection settings for the InfluxDB backend.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the HTTP API, only used for provisioning databases.
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_credential")]
    pub username: String,
    #[serde(default = "default_credential")]
    pub password: String,
    /// UDP port used for tenants that do not configure their own.
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    /// Upper bound for a single datagram. Lines are packed up to this size.
    #[serde(default = "default_udp_payload_bytes")]
    pub udp_payload_bytes: usize,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            host: default_host(),
            port: default_http_port(),
            username: default_credential(),
            password: default_credential(),
            udp_port: default_udp_port(),
            udp_payload_bytes: default_udp_payload_bytes(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort("port"));
        }
        if self.udp_port == 0 {
            return Err(ValidationError::InvalidPort("udp_port"));
        }
        if self.udp_payload_bytes == 0 {
            return Err(ValidationError::InvalidPayloadSize);
        }
        Ok(())
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_http_port() -> u16 {
    8086
}
fn default_credential() -> String {
    "root".into()
}
fn default_udp_port() -> u16 {
    8089
}
fn default_udp_payload_bytes() -> usize {
    1400
}
fn default_http_timeout_secs() -> u64 {
    10
}
