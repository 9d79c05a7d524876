//! End-to-end scenario coverage that spans modules (spec §8's S4–S6):
//! store-down resilience, concurrent load against the pool, and upstream
//! silence. Per-module unit tests already cover the codec, the store wire
//! parser and the send queue in isolation.

use std::sync::Arc;

use crate::store::StorePool;

#[tokio::test]
async fn s4_store_down_is_treated_as_a_miss() {
    // nothing listens on this port, so every connection attempt is refused
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = dead.local_addr().unwrap();
    drop(dead);

    let pool = StorePool::new("127.0.0.1", addr.port(), 0, 4, 200, 200);
    assert_eq!(pool.lookup("example.com").await, None);
    // the failed session didn't leak a permit or strand the client
    assert_eq!(pool.idle_len(), 4);
    assert_eq!(pool.available_permits(), 4);
}

#[tokio::test]
async fn s5_concurrent_load_preserves_pool_balance() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            tokio::spawn(async move {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut buf = [0u8; 128];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {
                            let _ = stream.write_all(b"$-1\r\n").await;
                        }
                    }
                }
            });
        }
    });

    let pool = Arc::new(StorePool::new(&addr.ip().to_string(), addr.port(), 0, 8, 500, 500));

    let mut handles = Vec::new();
    for i in 0..1000 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            pool.lookup(&format!("host{i}.example.com")).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), None);
    }

    assert_eq!(pool.idle_len(), 8);
    assert_eq!(pool.available_permits(), 8);
}

#[tokio::test]
async fn s5_cancelled_lookup_still_returns_its_slot() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // accept connections but never write a reply, so lookups hang
        loop {
            if listener.accept().await.is_err() {
                return;
            }
        }
    });

    let pool = Arc::new(StorePool::new(&addr.ip().to_string(), addr.port(), 0, 2, 500, 50));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move { pool.lookup("stuck.example.com").await }));
    }
    // let both lookups block on the never-replying store, then cancel them
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    for handle in handles {
        handle.abort();
    }
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert_eq!(pool.idle_len(), 2);
    assert_eq!(pool.available_permits(), 2);
}

#[tokio::test]
async fn s6_upstream_silence_yields_no_reply() {
    let dead_socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead_socket.local_addr().unwrap();
    drop(dead_socket);

    let result = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        crate::forwarder::forward(b"irrelevant", dead_addr),
    )
    .await;
    assert!(result.is_err() || result.unwrap().is_none());
}
