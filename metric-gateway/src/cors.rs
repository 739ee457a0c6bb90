//! CORS preflight negotiation for the metric endpoint.
//!
//! Browsers only send the actual `POST` once the preflight succeeded, so a
//! successful preflight reveals as little as a successful `POST`: it requires
//! valid credentials and an allowed origin.

use crate::errors::RequestError;
use crate::registry::TenantRegistry;
use crate::resolver::{Credentials, ORIGIN, resolve};
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_METHOD,
    CONTENT_TYPE, HeaderMap, HeaderValue,
};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Method, Response};
use shared::http::empty_body;

pub const REQUEST_METHOD: &str = "Access-Control-Request-Method";

/// Answers an `OPTIONS` request for `/metric/{tenant}/{secret}`.
///
/// Both `Origin` and `Access-Control-Request-Method` must be present before
/// the credentials are looked at. Once the tenant is resolved every response,
/// including the 405 for a method other than `POST`, echoes the origin.
pub fn preflight<E: 'static>(
    registry: &TenantRegistry,
    max_age: &HeaderValue,
    credentials: &Credentials,
    headers: &HeaderMap,
) -> Response<BoxBody<Bytes, E>> {
    let Some(origin) = headers.get(http::header::ORIGIN) else {
        return RequestError::MissingHeader(ORIGIN).into_response();
    };
    let Some(requested_method) = headers.get(ACCESS_CONTROL_REQUEST_METHOD) else {
        return RequestError::MissingHeader(REQUEST_METHOD).into_response();
    };

    let resolved = match resolve(registry, credentials, Some(origin)) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::debug!(tenant = %credentials.tenant_id, error = %err, "preflight rejected");
            return err.into_response();
        }
    };

    let mut response = if requested_method == Method::POST.as_str() {
        granted(max_age)
    } else {
        RequestError::MethodNotAllowed {
            requested: String::from_utf8_lossy(requested_method.as_bytes()).into_owned(),
            allowed: "POST",
        }
        .into_response()
    };
    allow_origin(&mut response, &resolved.origin);
    response
}

/// Echoes `origin` back as `Access-Control-Allow-Origin`.
pub fn allow_origin<B>(response: &mut Response<B>, origin: &HeaderValue) {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
}

fn granted<E: 'static>(max_age: &HeaderValue) -> Response<BoxBody<Bytes, E>> {
    let mut response = Response::new(empty_body());
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, max_age.clone());
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
