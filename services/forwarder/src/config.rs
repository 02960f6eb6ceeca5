//! Forwarder configuration.
//!
//! The config document is JSON of this shape:
//!
//! ```json
//! {
//!   "settings": { "frontend_port": 8080, "connect_timeout_ms": 2000 },
//!   "proxied_host": {
//!     "general_settings": {
//!       "backend_ip": "127.0.0.1",
//!       "backend_port": 9000,
//!       "optional_note": "staging api"
//!     }
//!   }
//! }
//! ```
//!
//! Every section and field may be absent. Missing fields keep their zero/empty
//! default instead of failing the load.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Longest accepted `backend_ip` (dotted-quad IPv4).
pub const MAX_BACKEND_IP_LEN: usize = 15;

/// Longest accepted `optional_note`.
pub const MAX_NOTE_LEN: usize = 255;

/// Default bound on a single backend connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Immutable forwarder configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Port to accept client connections on (0 lets the OS pick).
    pub frontend_port: u16,

    /// The one backend every connection is relayed to.
    pub backend_addr: SocketAddrV4,

    /// Free-text note shown in the startup banner.
    pub note: String,

    /// Bound on each backend connect attempt.
    pub connect_timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigDocument {
    settings: SettingsSection,
    proxied_host: ProxiedHostSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsSection {
    frontend_port: Option<i64>,
    connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProxiedHostSection {
    general_settings: GeneralSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneralSettings {
    backend_ip: Option<String>,
    backend_port: Option<i64>,
    optional_note: Option<String>,
}

impl ProxyConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_document(doc)
    }

    /// Parse configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Self::from_document(serde_json::from_str(text)?)
    }

    fn from_document(doc: ConfigDocument) -> Result<Self, ConfigError> {
        let general = doc.proxied_host.general_settings;

        let frontend_port = port_field("frontend_port", doc.settings.frontend_port)?;
        let backend_port = port_field("backend_port", general.backend_port)?;

        let backend_ip = bounded_text(
            "backend_ip",
            general.backend_ip.unwrap_or_default(),
            MAX_BACKEND_IP_LEN,
        )?;
        let backend_ip = parse_backend_ip(&backend_ip)?;

        let note = bounded_text(
            "optional_note",
            general.optional_note.unwrap_or_default(),
            MAX_NOTE_LEN,
        )?;

        let connect_timeout = doc
            .settings
            .connect_timeout_ms
            .map(|ms| Duration::from_millis(ms.max(1)))
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        Ok(Self {
            frontend_port,
            backend_addr: SocketAddrV4::new(backend_ip, backend_port),
            note,
            connect_timeout,
        })
    }

    /// Address the listener binds: all IPv4 interfaces on the frontend port.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.frontend_port))
    }
}

/// Absent ports default to 0; present ones must fit in a `u16`.
fn port_field(field: &'static str, value: Option<i64>) -> Result<u16, ConfigError> {
    let value = value.unwrap_or(0);
    u16::try_from(value).map_err(|_| ConfigError::PortOutOfRange { field, value })
}

fn bounded_text(field: &'static str, value: String, max: usize) -> Result<String, ConfigError> {
    if value.len() > max {
        return Err(ConfigError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(value)
}

/// An empty address stays at the unspecified default.
fn parse_backend_ip(value: &str) -> Result<Ipv4Addr, ConfigError> {
    if value.is_empty() {
        return Ok(Ipv4Addr::UNSPECIFIED);
    }
    value
        .parse()
        .map_err(|_| ConfigError::InvalidBackendIp(value.to_string()))
}
