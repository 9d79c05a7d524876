//! A lightweight authoritative-override DNS edge resolver.
//!
//! Answers A-record lookups from a key/value override store when the
//! queried domain has an entry, and otherwise forwards the raw query to
//! an upstream resolver and relays the reply back to the client.

/// Wire format parsing and encoding
pub mod codec;
/// Environment/CLI driven configuration
pub mod config;
/// The crate-wide error taxonomy
pub mod error;
/// One-shot UDP forwarding to an upstream resolver
pub mod forwarder;
/// Logging setup
pub mod logging;
/// The request pipeline: socket, send queue, handlers
pub mod server;
/// The override store client and connection pool
pub mod store;

#[cfg(test)]
mod tests;

/// Size of a DNS message header in bytes
pub const HEADER_BYTES: usize = 12;
/// Read buffer size for inbound UDP datagrams. Larger than the classic
/// 512-byte limit to tolerate large questions; this server never itself
/// produces replies over 512 bytes (spec §4.5).
pub const UDP_BUFFER_SIZE: usize = 2048;
/// Default TTL (seconds) applied to locally-answered A records
pub const DEFAULT_TTL: u32 = 128;
/// Default number of store connections held open by the pool
pub const DEFAULT_POOL_SIZE: usize = 20;
/// Default port the override store (a redis-protocol service) listens on
pub const DEFAULT_STORE_PORT: u16 = 6379;
