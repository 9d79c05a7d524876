//! A one-shot UDP client: sends a verbatim query to the configured
//! upstream resolver and returns the first datagram received in reply.
//! A fresh endpoint per query — simpler than, and adequate for, the low
//! query rates this edge resolver expects (spec §4.4).

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Upstream replies aren't bounded by our own 2048-byte inbound limit;
/// give ourselves headroom for whatever the upstream sends back.
const UPSTREAM_READ_BUFFER_SIZE: usize = 4096;

/// Sends `query` unchanged to `upstream` and relays back whatever single
/// datagram comes back. Returns `None` on any socket error or upstream
/// silence — the caller treats both as "drop, no reply" (spec §4.4, §7).
pub async fn forward(query: &[u8], upstream: SocketAddr) -> Option<Vec<u8>> {
    let local_bind: SocketAddr = if upstream.is_ipv6() {
        "[::]:0".parse().expect("valid ipv6 ephemeral bind address")
    } else {
        "0.0.0.0:0".parse().expect("valid ipv4 ephemeral bind address")
    };

    let socket = match UdpSocket::bind(local_bind).await {
        Ok(socket) => socket,
        Err(error) => {
            warn!("failed to bind ephemeral forwarding socket: {error}");
            return None;
        }
    };

    if let Err(error) = socket.connect(upstream).await {
        warn!("failed to connect forwarding socket to {upstream}: {error}");
        return None;
    }

    if let Err(error) = socket.send(query).await {
        warn!("failed to send query to upstream {upstream}: {error}");
        return None;
    }

    let mut buf = [0u8; UPSTREAM_READ_BUFFER_SIZE];
    match socket.recv(&mut buf).await {
        Ok(len) => {
            debug!("received {len} bytes from upstream {upstream}");
            Some(buf[..len].to_vec())
        }
        Err(error) => {
            warn!("no reply from upstream {upstream}: {error}");
            None
        }
    }
}
