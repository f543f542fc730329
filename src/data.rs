//! Duplex line pump used on the direct connection once the punch succeeds.
//!
//! One task drains inbound lines and logs them, one task emits a numbered
//! heartbeat line on a fixed period. The loops are independent: either may
//! outlive the other, and neither restarts the socket.

use std::io::{Error, ErrorKind::Other, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::spawn;
use tokio::time::interval;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(2000);

/// Run both loops over an established stream until the connection dies.
pub async fn run(stream: TcpStream, tag: &str, period: Duration) -> Result<()> {
    let remote = stream.peer_addr()?;
    let (r, w) = stream.into_split();

    let recv = spawn(recv_loop(r, remote));
    let send = spawn(send_loop(w, tag.to_string(), period));

    let (received, sent) = tokio::join!(recv, send);
    if let Err(e) = received {
        log::warn!("receive loop aborted: {}", e);
    }

    match sent {
        Ok(result) => result,
        Err(e) => Err(Error::new(Other, e)),
    }
}

/// Read newline-delimited lines until EOF or a read error.
pub async fn recv_loop(r: OwnedReadHalf, from: SocketAddr) {
    let mut lines = BufReader::new(r).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => log::info!("[received from {}] {}", from, line.trim()),
            Ok(None) => {
                log::info!("{} closed the stream", from);
                break;
            }
            Err(e) => {
                log::warn!("read error from {}: {}", from, e);
                break;
            }
        }
    }
}

/// Write one numbered heartbeat line per period, stopping on the first
/// write error, which is returned to the caller.
pub async fn send_loop(mut w: OwnedWriteHalf, tag: String, period: Duration) -> Result<()> {
    let mut ticker = interval(period);

    for n in 0u64.. {
        ticker.tick().await;
        let line = format!("MSG #{} [{}]\n", n, tag);
        w.write_all(line.as_bytes()).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn stream_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn heartbeat_lines_are_numbered() {
        let (a, b) = stream_pair().await;
        let (_keep, w) = a.into_split();

        spawn(send_loop(w, "test".into(), Duration::from_millis(10)));

        let mut lines = BufReader::new(b).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "MSG #0 [test]");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "MSG #1 [test]");
    }

    #[tokio::test]
    async fn recv_loop_ends_on_eof() {
        let (a, b) = stream_pair().await;
        let from = a.peer_addr().unwrap();
        let (r, _w) = a.into_split();

        let handle = spawn(recv_loop(r, from));
        drop(b);

        timeout(Duration::from_secs(5), handle)
            .await
            .expect("recv loop should end when the peer closes")
            .unwrap();
    }

    #[tokio::test]
    async fn send_loop_stops_on_write_error() {
        let (a, b) = stream_pair().await;
        let (_r, w) = a.into_split();
        drop(b);

        let result = timeout(
            Duration::from_secs(5),
            send_loop(w, "test".into(), Duration::from_millis(10)),
        )
        .await
        .expect("send loop should stop once the peer is gone");

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_reports_the_send_loops_write_error() {
        let (a, b) = stream_pair().await;
        drop(b);

        let result = timeout(
            Duration::from_secs(5),
            run(a, "test", Duration::from_millis(10)),
        )
        .await
        .expect("run should end once the peer is gone");

        assert!(result.is_err());
    }
}
