use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("At least one tenant must be configured")]
    NoTenants,

    #[error("Empty tenant id")]
    EmptyTenantId,

    #[error("Duplicate tenant id: {0}")]
    DuplicateTenant(String),

    #[error("Tenant {0} has an empty public_key")]
    EmptyPublicKey(String),

    #[error("Tenant {0} has an empty allow_from list")]
    EmptyAllowList(String),

    #[error("Tenant {0} lists an empty origin")]
    EmptyOrigin(String),

    #[error("Tenant {0} has udp_port 0")]
    InvalidUdpPort(String),

    #[error("max_body_bytes cannot be 0")]
    InvalidMaxBodySize,
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for metric submissions
    #[serde(default)]
    pub listener: Listener,
    /// Lifetime of a preflight result in seconds, sent as `Access-Control-Max-Age`
    #[serde(default = "default_preflight_expiration")]
    pub preflight_expiration: u64,
    /// Largest request body accepted on the metric endpoint
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maps tenant ids (which are also database names) to their access policy
    pub tenants: HashMap<String, TenantConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.max_body_bytes == 0 {
            return Err(ValidationError::InvalidMaxBodySize);
        }
        if self.tenants.is_empty() {
            return Err(ValidationError::NoTenants);
        }

        for (tenant_id, tenant) in &self.tenants {
            if tenant_id.is_empty() {
                return Err(ValidationError::EmptyTenantId);
            }
            tenant.validate(tenant_id)?;
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8765,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TenantConfig {
    /// Shared secret embedded in the submission URL
    pub public_key: String,
    /// Origins allowed to submit, or `"*"` for any origin
    pub allow_from: AllowFrom,
    /// UDP port of the backend listener bound to this tenant's database.
    /// Falls back to the backend default when absent.
    #[serde(default)]
    pub udp_port: Option<u16>,
}

impl TenantConfig {
    fn validate(&self, tenant_id: &str) -> Result<(), ValidationError> {
        if self.public_key.is_empty() {
            return Err(ValidationError::EmptyPublicKey(tenant_id.to_string()));
        }
        if self.udp_port == Some(0) {
            return Err(ValidationError::InvalidUdpPort(tenant_id.to_string()));
        }
        if let AllowFrom::Origins(origins) = &self.allow_from {
            if origins.is_empty() {
                return Err(ValidationError::EmptyAllowList(tenant_id.to_string()));
            }
            if origins.iter().any(|origin| origin.is_empty()) {
                return Err(ValidationError::EmptyOrigin(tenant_id.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "RawAllowFrom")]
pub enum AllowFrom {
    Any,
    Origins(HashSet<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAllowFrom {
    Single(String),
    List(Vec<String>),
}

impl TryFrom<RawAllowFrom> for AllowFrom {
    type Error = String;

    fn try_from(raw: RawAllowFrom) -> Result<Self, Self::Error> {
        match raw {
            RawAllowFrom::Single(s) if s == "*" => Ok(AllowFrom::Any),
            RawAllowFrom::Single(s) => Err(format!(
                "allow_from must be a list of origins or \"*\", got {s:?}"
            )),
            RawAllowFrom::List(origins) => Ok(AllowFrom::Origins(origins.into_iter().collect())),
        }
    }
}

fn default_preflight_expiration() -> u64 {
    600
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}
