//! The request pipeline: one UDP socket, a receiver loop that spawns a
//! detached task per datagram, and a single sender task that drains a FIFO
//! send queue so writes never race on the shared socket (spec §4.5).

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::codec;
use crate::config::ConfigFile;
use crate::error::ServerError;
use crate::forwarder;
use crate::store::StorePool;
use crate::UDP_BUFFER_SIZE;

/// A FIFO queue of outbound datagrams plus a binary send-needed signal.
/// `std::sync::Mutex` rather than an async lock: the lock is only ever held
/// for the length of a `Vec`/`VecDeque` operation, never across an `.await`.
struct SendQueue {
    items: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    signal: Notify,
}

impl SendQueue {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            signal: Notify::new(),
        }
    }

    fn enqueue(&self, data: Vec<u8>, addr: SocketAddr) {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back((data, addr));
        self.signal.notify_one();
    }

    fn drain(&self) -> VecDeque<(Vec<u8>, SocketAddr)> {
        std::mem::take(
            &mut *self
                .items
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

/// Binds the UDP listener and runs the receiver and sender loops until the
/// receiver hits an unrecoverable socket error. Never returns `Ok` under
/// normal operation.
pub async fn run(
    config: Arc<ConfigFile>,
    pool: Arc<StorePool>,
) -> Result<(), ServerError> {
    let bind_addr = config.listener_address()?;
    let socket = Arc::new(UdpSocket::bind(bind_addr).await.map_err(|e| {
        ServerError::Startup(format!("failed to bind UDP listener on {bind_addr}: {e}"))
    })?);
    info!("started UDP listener on {bind_addr}");

    let queue = Arc::new(SendQueue::new());
    let upstream = config.dns_relay_address()?;

    let sender = tokio::spawn(sender_loop(socket.clone(), queue.clone()));
    let receive_result = receiver_loop(socket, queue, config, pool, upstream).await;
    sender.abort();
    receive_result
}

async fn receiver_loop(
    socket: Arc<UdpSocket>,
    queue: Arc<SendQueue>,
    config: Arc<ConfigFile>,
    pool: Arc<StorePool>,
    upstream: SocketAddr,
) -> Result<(), ServerError> {
    let mut buf = [0u8; UDP_BUFFER_SIZE];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(error) => {
                error!("error receiving from socket: {error}");
                continue;
            }
        };
        debug!("{len} bytes received from {from}");
        let datagram = buf[..len].to_vec();

        let queue = queue.clone();
        let config = config.clone();
        let pool = pool.clone();
        tokio::spawn(async move {
            handle_datagram(datagram, from, queue, config, pool, upstream).await;
        });
    }
}

async fn handle_datagram(
    datagram: Vec<u8>,
    from: SocketAddr,
    queue: Arc<SendQueue>,
    config: Arc<ConfigFile>,
    pool: Arc<StorePool>,
    upstream: SocketAddr,
) {
    let (transaction_id, questions) = match codec::parse(&datagram) {
        Ok(parsed) => parsed,
        Err(error) => {
            debug!("dropping malformed datagram from {from}: {error}");
            return;
        }
    };

    let domain = match codec::domain_of(&questions[0]) {
        Ok(domain) => domain,
        Err(error) => {
            debug!("dropping datagram from {from}: {error}");
            return;
        }
    };

    match pool.lookup(&domain).await {
        Some(address) => {
            let reply =
                codec::build_reply_with_ttl(transaction_id, &questions, Some(address), config.answer_ttl);
            queue.enqueue(reply, from);
        }
        None if domain.contains('.') => match forwarder::forward(&datagram, upstream).await {
            Some(reply) => queue.enqueue(reply, from),
            None => debug!("no upstream reply for {domain}, dropping query from {from}"),
        },
        None => {
            let reply = codec::build_reply(transaction_id, &questions, None);
            queue.enqueue(reply, from);
        }
    }
}

/// Waits for the send signal, then drains the whole queue in FIFO order.
/// `UdpSocket::send_to` already suspends until the socket is writable, so
/// there's no need to poll for `WouldBlock` by hand.
async fn sender_loop(socket: Arc<UdpSocket>, queue: Arc<SendQueue>) {
    loop {
        queue.signal.notified().await;
        for (data, addr) in queue.drain() {
            if let Err(error) = socket.send_to(&data, addr).await {
                error!("failed to send reply to {addr}: {error}");
            }
        }
    }
}
