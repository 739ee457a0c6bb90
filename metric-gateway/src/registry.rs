//! Tenant access policies, built once at startup and never mutated afterwards.
//!
//! The registry is shared between all connections behind an `Arc` and read
//! without any locking.

use crate::config::{AllowFrom, TenantConfig, ValidationError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum AllowedOrigins {
    /// Any origin is accepted. Responses still echo the request's origin,
    /// since credentialed CORS responses cannot use the literal `*`.
    Any,
    List(HashSet<String>),
}

impl AllowedOrigins {
    /// Exact, byte-wise membership. An empty origin is never allowed.
    pub fn allows(&self, origin: &[u8]) -> bool {
        if origin.is_empty() {
            return false;
        }
        match self {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(origins) => std::str::from_utf8(origin)
                .map(|origin| origins.contains(origin))
                .unwrap_or(false),
        }
    }
}

impl From<&AllowFrom> for AllowedOrigins {
    fn from(allow_from: &AllowFrom) -> Self {
        match allow_from {
            AllowFrom::Any => AllowedOrigins::Any,
            AllowFrom::Origins(origins) => AllowedOrigins::List(origins.clone()),
        }
    }
}

#[derive(PartialEq)]
pub struct TenantPolicy {
    /// Also the name of the tenant's database.
    pub tenant_id: String,
    pub shared_secret: String,
    pub allowed_origins: AllowedOrigins,
    pub backend_write_port: u16,
}

impl std::fmt::Debug for TenantPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantPolicy")
            .field("tenant_id", &self.tenant_id)
            .field("shared_secret", &"<redacted>")
            .field("allowed_origins", &self.allowed_origins)
            .field("backend_write_port", &self.backend_write_port)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct TenantRegistry {
    tenants: HashMap<String, Arc<TenantPolicy>>,
}

impl TenantRegistry {
    pub fn new<I>(policies: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = TenantPolicy>,
    {
        let mut tenants = HashMap::new();
        for policy in policies {
            let tenant_id = policy.tenant_id.clone();
            if tenants.insert(tenant_id.clone(), Arc::new(policy)).is_some() {
                return Err(ValidationError::DuplicateTenant(tenant_id));
            }
        }
        Ok(TenantRegistry { tenants })
    }

    /// Builds policies from validated configuration. Tenants without their own
    /// UDP port write through `default_udp_port`.
    pub fn from_config(
        tenants: &HashMap<String, TenantConfig>,
        default_udp_port: u16,
    ) -> Result<Self, ValidationError> {
        Self::new(tenants.iter().map(|(tenant_id, tenant)| TenantPolicy {
            tenant_id: tenant_id.clone(),
            shared_secret: tenant.public_key.clone(),
            allowed_origins: AllowedOrigins::from(&tenant.allow_from),
            backend_write_port: tenant.udp_port.unwrap_or(default_udp_port),
        }))
    }

    pub fn lookup(&self, tenant_id: &str) -> Option<Arc<TenantPolicy>> {
        self.tenants.get(tenant_id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.tenants.len()
    }
}
