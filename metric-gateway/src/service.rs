use crate::config::{Config, ValidationError};
use crate::cors;
use crate::errors::{GatewayError, RequestError};
use crate::ingest;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS, REQUESTS_INFLIGHT};
use crate::registry::TenantRegistry;
use crate::resolver::Credentials;
use http::HeaderValue;
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response};
use influx::PointWriter;
use shared::http::full_body;
use shared::{counter, gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub type HandlerBody = BoxBody<Bytes, GatewayError>;

/// Everything a request needs: the tenant registry, the backend writer and
/// the response settings. Built once, shared by all connections.
pub struct Gateway {
    pub(crate) registry: TenantRegistry,
    pub(crate) writer: Arc<dyn PointWriter>,
    pub(crate) preflight_max_age: HeaderValue,
    pub(crate) max_body_bytes: usize,
}

impl Gateway {
    pub fn new(
        registry: TenantRegistry,
        writer: Arc<dyn PointWriter>,
        preflight_expiration: u64,
        max_body_bytes: usize,
    ) -> Self {
        Gateway {
            registry,
            writer,
            preflight_max_age: HeaderValue::from(preflight_expiration),
            max_body_bytes,
        }
    }

    pub fn from_config(
        config: &Config,
        writer: Arc<dyn PointWriter>,
        default_udp_port: u16,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let registry = TenantRegistry::from_config(&config.tenants, default_udp_port)?;
        Ok(Self::new(
            registry,
            writer,
            config.preflight_expiration,
            config.max_body_bytes,
        ))
    }

    pub(crate) fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) async fn handle<B>(&self, request: Request<B>) -> Response<HandlerBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let route = match_route(request.uri().path());
        self.dispatch(route, request).await
    }

    async fn dispatch<B>(&self, route: Route, request: Request<B>) -> Response<HandlerBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();
        match (route, &parts.method) {
            (Route::Ping, &Method::GET) => Response::new(full_body("pong")),
            (Route::Ping, method) => method_not_allowed(method, "GET"),
            (Route::Metric(credentials), &Method::OPTIONS) => cors::preflight(
                &self.registry,
                &self.preflight_max_age,
                &credentials,
                &parts.headers,
            ),
            (Route::Metric(credentials), &Method::POST) => {
                ingest::handle_post(self, &credentials, &parts.headers, body).await
            }
            (Route::Metric(_), method) => method_not_allowed(method, "OPTIONS, POST"),
            (Route::NotFound, _) => RequestError::NotFound.into_response(),
        }
    }
}

fn method_not_allowed(method: &Method, allowed: &'static str) -> Response<HandlerBody> {
    RequestError::MethodNotAllowed {
        requested: method.to_string(),
        allowed,
    }
    .into_response()
}

#[derive(Debug, PartialEq)]
enum Route {
    Ping,
    /// `/metric/{tenant}/{secret}`, where the secret runs to the end of the path.
    Metric(Credentials),
    NotFound,
}

impl Route {
    fn label(&self) -> &'static str {
        match self {
            Route::Ping => "ping",
            Route::Metric(_) => "metric",
            Route::NotFound => "not_found",
        }
    }
}

fn match_route(path: &str) -> Route {
    if path == "/ping" {
        return Route::Ping;
    }
    if let Some(rest) = path.strip_prefix("/metric/")
        && let Some((tenant, secret)) = rest.split_once('/')
        && !tenant.is_empty()
        && !secret.is_empty()
    {
        return Route::Metric(Credentials::new(decode(tenant), decode(secret)));
    }
    Route::NotFound
}

fn decode(segment: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
}

struct InflightGuard;

impl InflightGuard {
    fn enter() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

pub struct GatewayService {
    gateway: Arc<Gateway>,
}

impl GatewayService {
    pub fn new(gateway: Gateway) -> Self {
        GatewayService {
            gateway: Arc::new(gateway),
        }
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<HandlerBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        let gateway = self.gateway.clone();
        let route = match_route(request.uri().path());
        let label = route.label();
        // The path carries the tenant secret, so only the route goes into the span.
        let span = tracing::info_span!("request", method = %request.method(), route = label);

        Box::pin(
            async move {
                let _inflight = InflightGuard::enter();
                let start = Instant::now();

                let response = gateway.dispatch(route, request).await;

                let status = response.status();
                tracing::debug!(status = status.as_u16(), "request handled");
                counter!(REQUESTS, "route" => label, "status" => status.as_str().to_owned())
                    .increment(1);
                histogram!(REQUEST_DURATION, "route" => label)
                    .record(start.elapsed().as_secs_f64());
                Ok(response)
            }
            .instrument(span),
        )
    }
}
