use thiserror::Error;

/// Failures of a single write.
///
/// Only `MalformedData` is the caller's fault; everything else is a transport
/// or backend problem.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("{0}")]
    MalformedData(String),

    #[error("could not resolve backend host {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    #[error("backend host {0} did not resolve to any address")]
    NoAddress(String),

    #[error("udp transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("datagram truncated: sent {sent} of {len} bytes")]
    Truncated { sent: usize, len: usize },
}

impl WriteError {
    /// Short label used to tag failure metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WriteError::MalformedData(_) => "malformed_data",
            WriteError::Resolve { .. } | WriteError::NoAddress(_) => "resolve",
            WriteError::Io(_) => "io",
            WriteError::Truncated { .. } => "truncated",
        }
    }
}

/// Failures while creating databases at startup.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("creating database {database} failed with status {status}: {body}")]
    Rejected {
        database: String,
        status: reqwest::StatusCode,
        body: String,
    },
}
