//! Rendezvous server: pairs exactly two peers and exchanges their observed
//! address tuples, then stays out of the data path.
//!
//! Two listeners run concurrently. The discussion listener takes the two
//! control connections, the punch listener takes the two connections whose
//! remote addressing reveals each peer's NAT-translated endpoint. Labels A
//! and B are purely accept order on each listener. One pairing per run.

use std::future::pending;
use std::io::Result;
use std::net::IpAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::try_join;

use crate::wire::{self, ObservedAddr};

pub struct Server {
    discussion: TcpListener,
    punch: TcpListener,
}

struct PeerRecord {
    name: &'static str,
    discussion: TcpStream,
    addr: ObservedAddr,
    // held open for the lifetime of the session, never read
    _punch: TcpStream,
}

impl Server {
    pub async fn new(listen_ip: IpAddr, discussion_port: u16, punch_port: u16) -> Result<Self> {
        let discussion = TcpListener::bind((listen_ip, discussion_port)).await?;
        let punch = TcpListener::bind((listen_ip, punch_port)).await?;

        Ok(Self { discussion, punch })
    }

    /// Actual listening ports, useful when bound to port 0.
    pub fn ports(&self) -> Result<(u16, u16)> {
        Ok((
            self.discussion.local_addr()?.port(),
            self.punch.local_addr()?.port(),
        ))
    }

    pub async fn run(self) -> Result<()> {
        let (discussion_port, punch_port) = self.ports()?;
        log::info!(
            "rendezvous server started, discussion port {}, punch port {}",
            discussion_port,
            punch_port
        );

        let ((da, db), ((pa, addr_a), (pb, addr_b))) = try_join!(
            accept_discussion_pair(self.discussion),
            observe_punch_pair(self.punch),
        )?;

        let mut a = PeerRecord {
            name: "A",
            discussion: da,
            addr: addr_a,
            _punch: pa,
        };
        let mut b = PeerRecord {
            name: "B",
            discussion: db,
            addr: addr_b,
            _punch: pb,
        };

        exchange(&mut a, &mut b).await?;
        log::info!("exchange complete, peers are on their own now");

        // One pairing per run: keep every socket open but do nothing more.
        pending().await
    }
}

async fn accept_discussion_pair(listener: TcpListener) -> Result<(TcpStream, TcpStream)> {
    let a = accept_labeled(&listener, "A").await?;
    let b = accept_labeled(&listener, "B").await?;

    Ok((a, b))
}

async fn accept_labeled(listener: &TcpListener, name: &str) -> Result<TcpStream> {
    log::info!("waiting for peer {}", name);
    let (stream, from) = listener.accept().await?;
    log::info!("peer {} connected from {}", name, from);

    Ok(stream)
}

async fn observe_punch_pair(
    listener: TcpListener,
) -> Result<((TcpStream, ObservedAddr), (TcpStream, ObservedAddr))> {
    let a = observe_punch(&listener, "A").await?;
    let b = observe_punch(&listener, "B").await?;

    Ok((a, b))
}

async fn observe_punch(listener: &TcpListener, name: &str) -> Result<(TcpStream, ObservedAddr)> {
    log::info!("waiting for peer {} punch", name);
    let (stream, from) = listener.accept().await?;

    // The remote port is the NAT-translated public port and, for a
    // port-preserving NAT, also the source port the peer rebinds to punch.
    let addr = ObservedAddr {
        ip: from.ip(),
        public_port: from.port(),
        local_port: from.port(),
    };
    log::info!("peer {} punched, observed tuple {}", name, addr);

    Ok((stream, addr))
}

/// Runs exactly once, after both punch connections are recorded. Each peer
/// receives the other's tuple, never its own alone; B runs the
/// listener-capable role and gets its own tuple prefixed to A's.
async fn exchange(a: &mut PeerRecord, b: &mut PeerRecord) -> Result<()> {
    log::info!("exchanging tuples: {} {}, {} {}", a.name, a.addr, b.name, b.addr);

    let to_a = format!("{}\n", b.addr);
    a.discussion.write_all(to_a.as_bytes()).await?;

    let to_b = format!("{}\n", wire::encode_pair(&b.addr, &a.addr));
    b.discussion.write_all(to_b.as_bytes()).await?;

    Ok(())
}
