use crate::config::BackendConfig;
use crate::errors::{ProvisionError, WriteError};
use crate::line_protocol::{encode_points, pack_datagrams};
use crate::metrics_defs::{DATABASES_CREATED, DATAGRAMS_SENT};
use async_trait::async_trait;
use serde_json::Value;
use shared::counter;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use url::Url;

/// Write side of the backend.
///
/// Implementations must tolerate concurrent calls, including concurrent calls
/// for the same database.
#[async_trait]
pub trait PointWriter: Send + Sync {
    /// Validates `points` and sends them to the UDP listener on `udp_port`.
    ///
    /// InfluxDB binds each UDP listener to a single database, so `database`
    /// is only used for reporting.
    async fn write(
        &self,
        database: &str,
        points: Vec<Value>,
        udp_port: u16,
    ) -> Result<(), WriteError>;
}

pub struct InfluxDriver {
    config: BackendConfig,
    http: reqwest::Client,
}

impl InfluxDriver {
    pub fn new(config: BackendConfig) -> Result<Self, ProvisionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(InfluxDriver { config, http })
    }

    /// Creates every database, in name order. `CREATE DATABASE` is a no-op in
    /// InfluxDB when the database already exists.
    pub async fn create_databases<I, S>(&self, databases: I) -> Result<(), ProvisionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = databases
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        names.sort();

        let url = Url::parse(&format!("http://{}:{}/", self.config.host, self.config.port))?
            .join("query")?;

        for name in &names {
            self.create_database(&url, name).await?;
        }
        Ok(())
    }

    async fn create_database(&self, url: &Url, name: &str) -> Result<(), ProvisionError> {
        let statement = format!("CREATE DATABASE {}", quote_ident(name));
        let response = self
            .http
            .post(url.clone())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .query(&[("q", statement.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Rejected {
                database: name.to_string(),
                status,
                body,
            });
        }

        tracing::info!(database = name, "database ready");
        counter!(DATABASES_CREATED).increment(1);
        Ok(())
    }

    async fn resolve(&self, udp_port: u16) -> Result<SocketAddr, WriteError> {
        let host = self.config.host.as_str();
        tokio::net::lookup_host((host, udp_port))
            .await
            .map_err(|source| WriteError::Resolve {
                host: host.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| WriteError::NoAddress(host.to_string()))
    }
}

#[async_trait]
impl PointWriter for InfluxDriver {
    async fn write(
        &self,
        database: &str,
        points: Vec<Value>,
        udp_port: u16,
    ) -> Result<(), WriteError> {
        let lines = encode_points(&points)?;
        if lines.is_empty() {
            tracing::debug!(database, "no points to write");
            return Ok(());
        }

        let target = self.resolve(udp_port).await?;
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        // One socket per write keeps concurrent writes independent of each other.
        let socket = UdpSocket::bind(local).await?;

        for datagram in pack_datagrams(&lines, self.config.udp_payload_bytes) {
            let sent = socket.send_to(datagram.as_bytes(), target).await?;
            if sent < datagram.len() {
                return Err(WriteError::Truncated {
                    sent,
                    len: datagram.len(),
                });
            }
            counter!(DATAGRAMS_SENT, "database" => database.to_string()).increment(1);
        }

        tracing::debug!(database, points = lines.len(), %target, "points sent");
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}
