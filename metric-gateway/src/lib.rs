//! Multi-tenant metric submission gateway.
//!
//! Browsers post points to `/metric/{tenant}/{secret}`. Each request is
//! checked against the tenant's secret and allowed origins, answered with the
//! matching CORS headers and, when accepted, handed to a [`PointWriter`].

pub mod config;
pub mod cors;
pub mod errors;
pub mod ingest;
pub mod metrics_defs;
pub mod registry;
pub mod resolver;
pub mod service;

#[cfg(test)]
mod testutils;

use crate::config::Config;
use crate::errors::Result;
use crate::service::{Gateway, GatewayService};
use influx::PointWriter;
use shared::http::run_http_service;
use std::sync::Arc;

/// Builds the tenant registry from `config` and serves until shutdown.
///
/// Tenants without their own UDP port write through `default_udp_port`.
pub async fn run(
    config: Config,
    writer: Arc<dyn PointWriter>,
    default_udp_port: u16,
) -> Result<()> {
    let gateway = Gateway::from_config(&config, writer, default_udp_port)?;
    shared::describe_metrics!(metrics_defs::ALL_METRICS);
    tracing::info!(tenants = gateway.registry().len(), "tenant registry loaded");

    run_http_service(
        &config.listener.host,
        config.listener.port,
        GatewayService::new(gateway),
    )
    .await
}
