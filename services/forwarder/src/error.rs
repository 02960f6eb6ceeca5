//! Error types for the forwarder.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration load errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config document.
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not JSON of the expected shape.
    #[error("unable to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Config text handed in directly is not JSON of the expected shape.
    #[error("unable to parse config document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A text field exceeds its maximum length.
    #[error("field_too_long: {field} is {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A port field is outside 0-65535.
    #[error("port_out_of_range: {field}={value}")]
    PortOutOfRange { field: &'static str, value: i64 },

    /// The backend address is not an IPv4 literal.
    #[error("invalid_backend_ip: {0:?} is not an IPv4 address")]
    InvalidBackendIp(String),
}

impl ConfigError {
    /// Get the standardized reason code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read_failed",
            ConfigError::Parse { .. } | ConfigError::Malformed(_) => "config_parse_failed",
            ConfigError::FieldTooLong { .. } => "field_too_long",
            ConfigError::PortOutOfRange { .. } => "port_out_of_range",
            ConfigError::InvalidBackendIp(_) => "invalid_backend_ip",
        }
    }
}
