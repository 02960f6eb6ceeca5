//! L4 TCP forwarding.
//!
//! This module provides:
//! - TCP listener management
//! - The fixed backend endpoint and its bounded connect
//! - The per-connection byte relay
//!
//! ## Architecture
//!
//! ```text
//! Client -> Listener -> (spawned task) connect Backend -> relay <-> Backend
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use fwd_forwarder::{Listener, ProxyConfig};
//!
//! let config = ProxyConfig::load("forwarder.json")?;
//! let listener = Listener::bind(&config).await?;
//! listener.run().await?;
//! ```

mod backend;
mod listener;
mod relay;

pub use backend::Backend;
pub use listener::{handle_connection, Listener};
pub use relay::{relay, RelayEnd, RelaySummary, RELAY_BUFFER_SIZE};
