use crate::registry::{AllowedOrigins, TenantPolicy, TenantRegistry};
use crate::service::Gateway;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use influx::{PointWriter, WriteError};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// `acme` only accepts https://acme.example; `open` accepts any origin and has
/// a secret containing slashes.
pub fn test_registry() -> TenantRegistry {
    TenantRegistry::new([
        TenantPolicy {
            tenant_id: "acme".into(),
            shared_secret: "k1".into(),
            allowed_origins: AllowedOrigins::List(HashSet::from([
                "https://acme.example".to_string()
            ])),
            backend_write_port: 8090,
        },
        TenantPolicy {
            tenant_id: "open".into(),
            shared_secret: "s3cr3t/with/slashes".into(),
            allowed_origins: AllowedOrigins::Any,
            backend_write_port: 8091,
        },
    ])
    .unwrap()
}

pub fn test_gateway(writer: Arc<RecordingWriter>) -> Gateway {
    Gateway::new(test_registry(), writer, 600, 1024)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub database: String,
    pub points: Vec<Value>,
    pub udp_port: u16,
}

pub enum Outcome {
    Accept,
    Malformed(&'static str),
    Fail(&'static str),
}

/// Point writer that records every call and answers with a fixed outcome.
pub struct RecordingWriter {
    outcome: Outcome,
    calls: Mutex<Vec<WriteCall>>,
}

impl RecordingWriter {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(RecordingWriter {
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<WriteCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PointWriter for RecordingWriter {
    async fn write(
        &self,
        database: &str,
        points: Vec<Value>,
        udp_port: u16,
    ) -> Result<(), WriteError> {
        self.calls.lock().unwrap().push(WriteCall {
            database: database.to_string(),
            points,
            udp_port,
        });
        match self.outcome {
            Outcome::Accept => Ok(()),
            Outcome::Malformed(message) => Err(WriteError::MalformedData(message.to_string())),
            Outcome::Fail(message) => Err(WriteError::Io(std::io::Error::other(message))),
        }
    }
}

pub fn request(
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

pub async fn body_string<B>(response: Response<B>) -> String
where
    B: Body,
    B::Error: std::fmt::Debug,
{
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// In-memory sink for a `tracing` subscriber.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let capture = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || capture.clone())
            .with_ansi(false)
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
