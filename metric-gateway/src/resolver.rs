//! Maps the credentials embedded in a metric URL plus the request's `Origin`
//! to a tenant policy.
//!
//! Checks run in a fixed order, which decides the error a client sees when
//! several things are wrong at once:
//!
//! 1. `Origin` present, else `MissingHeader`
//! 2. tenant exists, else `Unauthorized`
//! 3. secret matches, else `Unauthorized` (same message as 2)
//! 4. origin allowed for the tenant, else `OriginForbidden`

use crate::errors::RequestError;
use crate::registry::{TenantPolicy, TenantRegistry};
use http::HeaderValue;
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const ORIGIN: &str = "Origin";

/// Tenant id and secret taken from `/metric/{tenant}/{secret}`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant_id: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(tenant_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials {
            tenant_id: tenant_id.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

/// A request that passed every check. `origin` is the raw header value to echo.
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub policy: Arc<TenantPolicy>,
    pub origin: HeaderValue,
}

pub fn resolve(
    registry: &TenantRegistry,
    credentials: &Credentials,
    origin: Option<&HeaderValue>,
) -> Result<ResolvedTenant, RequestError> {
    let origin = origin.ok_or(RequestError::MissingHeader(ORIGIN))?;

    let policy = registry
        .lookup(&credentials.tenant_id)
        .ok_or(RequestError::Unauthorized)?;

    if !secrets_match(&credentials.secret, &policy.shared_secret) {
        return Err(RequestError::Unauthorized);
    }

    if !policy.allowed_origins.allows(origin.as_bytes()) {
        return Err(RequestError::OriginForbidden);
    }

    Ok(ResolvedTenant {
        policy,
        origin: origin.clone(),
    })
}

fn secrets_match(given: &str, expected: &str) -> bool {
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}
