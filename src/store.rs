//! A session to the override store: a remote key/value service speaking a
//! line-terminated request/reply protocol (a minimal, binary-safe-enough
//! read of the redis wire protocol — see spec §4.2).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ServerError;

const READ_BUFFER_SIZE: usize = 128;

/// A stateful session to the override store. Lazily opens its TCP
/// connection on first use; any I/O failure mid-session closes it so the
/// next call reopens lazily.
#[derive(Debug)]
pub struct StoreClient {
    host: String,
    port: u16,
    db: u64,
    connect_timeout: Duration,
    read_timeout: Duration,
    connection: Option<TcpStream>,
}

impl StoreClient {
    pub fn new(host: String, port: u16, db: u64, connect_timeout_ms: u64, read_timeout_ms: u64) -> Self {
        Self {
            host,
            port,
            db,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            read_timeout: Duration::from_millis(read_timeout_ms),
            connection: None,
        }
    }

    /// Runs `cmd`, returning the value for a bulk-string reply, or `None`
    /// for `$-1`, a status (`+...`), or an error (`-...`) reply.
    pub async fn execute(&mut self, cmd: &str) -> Result<Option<Vec<u8>>, ServerError> {
        self.ensure_connected().await?;
        match self.send_and_read(cmd).await {
            Ok(value) => Ok(value),
            Err(error) => {
                // any I/O failure mid-session closes it; next call reopens lazily
                self.connection = None;
                Err(error)
            }
        }
    }

    pub fn close(&mut self) {
        self.connection = None;
    }

    async fn ensure_connected(&mut self) -> Result<(), ServerError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let stream = timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| {
            ServerError::StoreUnavailable(format!(
                "{}:{}: connect timed out after {:?}",
                self.host, self.port, self.connect_timeout
            ))
        })?
        .map_err(|e| ServerError::StoreUnavailable(format!("{}:{}: {e}", self.host, self.port)))?;
        self.connection = Some(stream);

        if self.db != 0 {
            if let Err(error) = self.send_and_read(&format!("SELECT {}", self.db)).await {
                // connect succeeded but SELECT failed; don't leave a half-negotiated
                // session behind for the next call to mistake for a ready one
                self.connection = None;
                return Err(error);
            }
        }
        Ok(())
    }

    async fn send_and_read(&mut self, cmd: &str) -> Result<Option<Vec<u8>>, ServerError> {
        let read_timeout = self.read_timeout;
        let stream = self
            .connection
            .as_mut()
            .ok_or_else(|| ServerError::StoreUnavailable("not connected".to_string()))?;

        timeout(read_timeout, stream.write_all(format!("{cmd}\r\n").as_bytes()))
            .await
            .map_err(|_| ServerError::StoreUnavailable(format!("write timed out after {read_timeout:?}")))?
            .map_err(|e| ServerError::StoreUnavailable(e.to_string()))?;

        let mut buf = [0u8; READ_BUFFER_SIZE];
        let n = timeout(read_timeout, stream.read(&mut buf))
            .await
            .map_err(|_| ServerError::StoreUnavailable(format!("read timed out after {read_timeout:?}")))?
            .map_err(|e| ServerError::StoreUnavailable(e.to_string()))?;
        if n == 0 {
            return Err(ServerError::StoreUnavailable(
                "store closed the connection".to_string(),
            ));
        }

        let trimmed = trim_trailing_crlf(&buf[..n]);
        Ok(parse_reply(trimmed))
    }
}

fn trim_trailing_crlf(buf: &[u8]) -> &[u8] {
    buf.strip_suffix(b"\r\n").unwrap_or(buf)
}

/// Discriminates a trimmed reply buffer on its first byte: `$-1` is absent,
/// a leading `+`/`-` collapses status/error to absent, otherwise the buffer
/// is a length line and a value line joined by CRLF and the value is
/// returned. A deliberately minimal read of the protocol (spec §4.2).
fn parse_reply(buf: &[u8]) -> Option<Vec<u8>> {
    if buf.is_empty() || buf == b"$-1" {
        return None;
    }
    match buf[0] {
        b'+' | b'-' => None,
        _ => {
            let sep = find_subslice(buf, b"\r\n")?;
            Some(buf[sep + 2..].to_vec())
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A fixed-size pool of [`StoreClient`]s with a bounded-concurrency
/// admission discipline (spec §4.3). `lookup` acquires a permit, borrows an
/// idle client, runs `GET <domain>`, and always returns both on scope exit
/// — including cancellation.
pub struct StorePool {
    semaphore: Semaphore,
    idle: Mutex<VecDeque<StoreClient>>,
}

impl StorePool {
    pub fn new(
        host: &str,
        port: u16,
        db: u64,
        pool_size: usize,
        connect_timeout_ms: u64,
        read_timeout_ms: u64,
    ) -> Self {
        let idle = (0..pool_size)
            .map(|_| StoreClient::new(host.to_string(), port, db, connect_timeout_ms, read_timeout_ms))
            .collect();
        Self {
            semaphore: Semaphore::new(pool_size),
            idle: Mutex::new(idle),
        }
    }

    /// Looks up a domain's override A record. Store outages and malformed
    /// values are treated as "no override" (spec §7): the server never
    /// fails a client request because the store is unreachable.
    pub async fn lookup(&self, domain: &str) -> Option<[u8; 4]> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("pool semaphore is never closed");

        let client = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .expect("pool invariant violated: permit granted but idle queue empty");
        let mut lease = Lease {
            idle: &self.idle,
            client: Some(client),
        };

        match lease.client_mut().execute(&format!("GET {domain}")).await {
            Ok(Some(bytes)) => match <[u8; 4]>::try_from(bytes.as_slice()) {
                Ok(address) => Some(address),
                Err(_) => {
                    warn!("override store returned a non-4-byte value for {domain}, ignoring");
                    None
                }
            },
            Ok(None) => {
                debug!("no override for {domain}");
                None
            }
            Err(error) => {
                warn!("override store lookup for {domain} failed: {error}");
                None
            }
        }
    }

    /// Number of clients currently idle plus currently-unused permits;
    /// should always equal the configured pool size outside an in-flight
    /// `acquire` (spec §8 property 4).
    #[cfg(test)]
    pub fn idle_len(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    #[cfg(test)]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Returns the leased client to the pool's idle queue on drop, regardless
/// of how the holding future exits (including task cancellation).
struct Lease<'a> {
    idle: &'a Mutex<VecDeque<StoreClient>>,
    client: Option<StoreClient>,
}

impl Lease<'_> {
    fn client_mut(&mut self) -> &mut StoreClient {
        self.client.as_mut().expect("client taken before drop")
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.idle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push_back(client);
        }
    }
}
