//! Minimal SEND/CACHE responder for trying the sweeper locally.
//!
//! Run with `cargo run --example echo_server -- 8013 [delay_ms]`, then point
//! `surge 127.0.0.1 8013` at it.

use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let port = args.next().map(|p| p.parse::<u16>()).transpose()?.unwrap_or(8013);
    let delay_ms = args.next().map(|d| d.parse::<u64>()).transpose()?.unwrap_or(0);
    let delay = Duration::from_millis(delay_ms);

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let served = Arc::new(AtomicU64::new(0));
    println!("Echo service listening on 127.0.0.1:{} (delay {:?})", port, delay);

    loop {
        let (mut socket, _) = listener.accept().await?;
        let served = Arc::clone(&served);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = match socket.read(&mut buf).await {
                Ok(n) => n,
                Err(_) => return,
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let request = String::from_utf8_lossy(&buf[..n]);
            let reply = match request.split_once(' ') {
                Some(("SEND", args)) => format!("ACK {}", args),
                Some(("CACHE", args)) => format!("UPDATE {}", args),
                _ => format!("ERR unknown command: {}", request),
            };
            let _ = socket.write_all(reply.as_bytes()).await;

            let count = served.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 1000 == 0 {
                println!("[{}] exchanges served", count);
            }
        });
    }
}
