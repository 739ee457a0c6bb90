use crate::cors::allow_origin;
use crate::errors::RequestError;
use crate::metrics_defs::{BACKEND_FAILURES, POINTS_WRITTEN};
use crate::resolver::{Credentials, ResolvedTenant, resolve};
use crate::service::Gateway;
use http::HeaderMap;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Response, StatusCode};
use influx::WriteError;
use serde_json::Value;
use shared::counter;
use shared::http::empty_body;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handles `POST /metric/{tenant}/{secret}`.
///
/// Requests that fail resolution get a bare status and reason. Anything after
/// that, success or not, echoes the origin.
pub async fn handle_post<B, E>(
    gateway: &Gateway,
    credentials: &Credentials,
    headers: &HeaderMap,
    body: B,
) -> Response<BoxBody<Bytes, E>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
    E: 'static,
{
    let resolved = match resolve(&gateway.registry, credentials, headers.get(http::header::ORIGIN))
    {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::debug!(tenant = %credentials.tenant_id, error = %err, "submission rejected");
            return err.into_response();
        }
    };

    let mut response = match ingest(gateway, &resolved, body).await {
        Ok(()) => {
            let mut response = Response::new(empty_body());
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
        }
        Err(err) => err.into_response(),
    };
    allow_origin(&mut response, &resolved.origin);
    response
}

async fn ingest<B>(gateway: &Gateway, resolved: &ResolvedTenant, body: B) -> Result<(), RequestError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let body = read_body(body, gateway.max_body_bytes).await?;
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|err| RequestError::BadRequestBody(format!("Invalid JSON: {err}")))?;
    let points = normalize(payload);
    let count = points.len() as u64;

    let tenant = &resolved.policy.tenant_id;
    match gateway
        .writer
        .write(tenant, points, resolved.policy.backend_write_port)
        .await
    {
        Ok(()) => {
            counter!(POINTS_WRITTEN, "tenant" => tenant.clone()).increment(count);
            Ok(())
        }
        Err(WriteError::MalformedData(message)) => {
            tracing::debug!(tenant = %tenant, reason = %message, "malformed points");
            Err(RequestError::BadRequestBody(message))
        }
        Err(err) => {
            let request_id = Uuid::new_v4();
            tracing::error!(
                %request_id,
                tenant = %tenant,
                error = %err,
                detail = ?err,
                "backend write failed"
            );
            counter!(BACKEND_FAILURES, "tenant" => tenant.clone(), "kind" => err.kind())
                .increment(1);
            Err(RequestError::BackendFailure { request_id })
        }
    }
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, RequestError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(RequestError::PayloadTooLarge(limit)),
        Err(err) => {
            tracing::debug!(error = %err, "failed to read request body");
            Err(RequestError::BadRequestBody(
                "Failed to read request body".to_string(),
            ))
        }
    }
}

/// A single point becomes a one element list. Lists pass through untouched,
/// anything else is left for the writer to reject.
fn normalize(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(points) => points,
        other => vec![other],
    }
}
