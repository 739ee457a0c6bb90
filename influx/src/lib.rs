//! InfluxDB write driver.
//!
//! Points arrive as decoded JSON, are validated and encoded to line protocol,
//! then shipped to the backend's UDP listener. Database provisioning goes
//! through the HTTP query API and is only used at startup.

pub mod config;
pub mod driver;
pub mod errors;
pub mod line_protocol;
pub mod metrics_defs;

pub use config::BackendConfig;
pub use driver::{InfluxDriver, PointWriter};
pub use errors::{ProvisionError, WriteError};
