pub mod config;
pub mod error;
pub mod proxy;

pub use config::ProxyConfig;
pub use error::ConfigError;
pub use proxy::{
    handle_connection, relay, Backend, Listener, RelayEnd, RelaySummary, RELAY_BUFFER_SIZE,
};
