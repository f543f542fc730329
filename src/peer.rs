//! Peer session: talk to the mediator, learn the counterpart's observed
//! address, punch, then hand the direct connection to the data channel.
//!
//! Two role variants share the same state machine (Connecting ->
//! AwaitingPeerInfo -> Punching -> DataExchange). The plain role only dials
//! the counterpart; the listener-capable role announces itself with the
//! `two` probe, acknowledges the handshake with `ackTwo`, and races an
//! accept against its dial. Every failure is terminal, nothing reconnects.

use std::io::{Error, ErrorKind, Result};
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::wire::{self, ObservedAddr};
use crate::{data, punch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Plain peer: only dials the counterpart.
    Connect,
    /// Listener-capable peer: also re-listens on the punch port.
    Listen,
}

impl Role {
    fn tag(self) -> &'static str {
        match self {
            Role::Connect => "connect",
            Role::Listen => "listen",
        }
    }
}

pub struct Peer {
    role: Role,
    discussion: BufReader<TcpStream>,
    punch: TcpStream,
}

impl Peer {
    /// Open the discussion and punch channels to the mediator. Any failure
    /// here is fatal; the session never starts.
    pub async fn connect(
        mediator_ip: IpAddr,
        discussion_port: u16,
        punch_port: u16,
        role: Role,
    ) -> Result<Self> {
        let discussion = TcpStream::connect((mediator_ip, discussion_port)).await?;

        // The punch socket is bound with address reuse from the start so
        // the same port can be rebound once the mediator connection closes.
        let local_addr: SocketAddr = match mediator_ip {
            IpAddr::V4(_) => "0.0.0.0:0".parse().unwrap(),
            IpAddr::V6(_) => "[::]:0".parse().unwrap(),
        };
        let punch =
            punch::connect_from(local_addr, SocketAddr::new(mediator_ip, punch_port)).await?;

        log::info!(
            "connected to mediator {} (discussion {}, punch {}), punching from local port {}",
            mediator_ip,
            discussion_port,
            punch_port,
            punch.local_addr()?.port()
        );

        let mut peer = Self {
            role,
            discussion: BufReader::new(discussion),
            punch,
        };

        if role == Role::Listen {
            // The probe's addressing, not its payload, is what the mediator
            // records.
            let probe = format!("{}\n", wire::PROBE);
            peer.punch.write_all(probe.as_bytes()).await?;
        }

        Ok(peer)
    }

    /// Local port of the punch socket, the one that gets rebound.
    pub fn punch_port(&self) -> Result<u16> {
        Ok(self.punch.local_addr()?.port())
    }

    /// Block for the mediator's handshake, then punch. Returns the direct
    /// connection to the counterpart.
    pub async fn rendezvous(mut self) -> Result<TcpStream> {
        let mut line = String::new();
        if self.discussion.read_line(&mut line).await? == 0 {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                "mediator closed the discussion channel",
            ));
        }

        let remote = match self.role {
            Role::Connect => line.parse::<ObservedAddr>()?,
            Role::Listen => {
                let (own, peer) = wire::decode_pair(&line)?;
                log::info!("mediator sees us as {}", own);

                let ack = format!("{}\n", wire::ACK);
                self.discussion.write_all(ack.as_bytes()).await?;

                peer
            }
        };

        log::info!(
            "counterpart is at {} (public port {})",
            remote.connect_target(),
            remote.public_port
        );

        punch::punch(
            self.punch,
            remote.connect_target(),
            self.role == Role::Listen,
        )
        .await
    }

    /// Run the whole session: rendezvous, punch, then pump heartbeats until
    /// the process dies.
    pub async fn run(self) -> Result<()> {
        let role = self.role;

        let stream = match self.rendezvous().await {
            Ok(stream) => stream,
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                log::error!("punch refused by the counterpart, giving up");
                return Err(e);
            }
            Err(e) => {
                log::error!("session failed: {}", e);
                return Err(e);
            }
        };

        data::run(stream, role.tag(), data::HEARTBEAT_INTERVAL).await
    }
}
