use crate::config::ValidationError;
use http::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::ext::ReasonPhrase;
use hyper::{Response, StatusCode};
use shared::http::full_body;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for gateway operations
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Errors that stop the gateway itself
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
}

/// Reasons a single request is rejected. Each one ends the request with a
/// response; none of them affect other requests.
#[derive(Error, Debug, PartialEq)]
pub enum RequestError {
    #[error("{0} header is missing")]
    MissingHeader(&'static str),

    /// Unknown tenant and wrong secret are deliberately indistinguishable.
    #[error("wrong tenant or key")]
    Unauthorized,

    #[error("Origin not allowed")]
    OriginForbidden,

    #[error("Method {requested} is not allowed")]
    MethodNotAllowed {
        requested: String,
        allowed: &'static str,
    },

    #[error("{0}")]
    BadRequestBody(String),

    #[error("Request body is larger than {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Not Found")]
    NotFound,

    #[error(
        "Internal Server Error. Please provide this ID to the system administrators: {request_id}"
    )]
    BackendFailure { request_id: Uuid },
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            RequestError::Unauthorized => StatusCode::UNAUTHORIZED,
            RequestError::OriginForbidden => StatusCode::FORBIDDEN,
            RequestError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::BadRequestBody(_) => StatusCode::BAD_REQUEST,
            RequestError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::NotFound => StatusCode::NOT_FOUND,
            RequestError::BackendFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text response carrying the reason both in the body and, for
    /// HTTP/1, in the status line.
    pub fn into_response<E: 'static>(self) -> Response<BoxBody<Bytes, E>> {
        let status = self.status();
        let reason = self.to_string();

        let mut response = Response::new(full_body(reason.clone()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if let RequestError::MethodNotAllowed { allowed, .. } = self {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allowed));
        }
        // Messages coming from the backend may contain bytes a status line cannot carry.
        if let Ok(phrase) = ReasonPhrase::try_from(reason.into_bytes()) {
            response.extensions_mut().insert(phrase);
        }

        response
    }
}
