//! TCP hole punching through an already-open NAT pinhole.
//!
//! The punch socket talked to the mediator from some local port; the NAT
//! keeps a mapping for that port. Closing the socket and dialing the peer
//! from the very same port rides the existing mapping, and the
//! listener-capable side additionally re-listens on that port so the pair
//! covers NATs that require either end to be the active opener.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::Result;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::select;

use crate::redirect;

/// Create a STREAM socket with address reuse enabled and bind it.
///
/// Reuse must be set on every socket touching the punch port: the old
/// connection lingers in TIME_WAIT after close, and the connecting and
/// listening sockets share the port while the race runs.
pub(crate) fn bind_reuse(local_addr: SocketAddr) -> Result<Socket> {
    let domain = match local_addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let s = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    s.set_reuse_address(true)?;
    #[cfg(unix)]
    s.set_reuse_port(true)?;
    s.bind(&local_addr.into())?;

    Ok(s)
}

/// Bind a fresh reusable socket to `local_addr` and connect it to `remote_addr`.
pub(crate) async fn connect_from(
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
) -> Result<TcpStream> {
    let s = bind_reuse(local_addr)?;
    s.set_nonblocking(true)?;

    TcpSocket::from_std_stream(s.into()).connect(remote_addr).await
}

/// Re-listen on the punch port and take the first inbound connection.
async fn accept_on(local_addr: SocketAddr) -> Result<TcpStream> {
    let s = bind_reuse(local_addr)?;
    s.listen(1)?;
    s.set_nonblocking(true)?;
    let listener = TcpListener::from_std(s.into())?;

    log::debug!("listening for the peer on port {}", local_addr.port());
    let (stream, from) = listener.accept().await?;
    log::debug!("accepted inbound connection from {}", from);

    Ok(stream)
}

/// Punch toward `remote_addr`, reusing the local port of `socket`.
///
/// `socket` is the punch connection to the mediator; it is closed here and
/// its port rebound. With `listen` set, an accept on that port races the
/// outbound connect and the first path to complete wins, the loser's socket
/// being dropped. A refused connect ends the attempt; there is no retry.
pub async fn punch(socket: TcpStream, remote_addr: SocketAddr, listen: bool) -> Result<TcpStream> {
    let local_addr = socket.local_addr()?;

    // The old socket must be fully closed before the port is bound again.
    drop(socket);

    let bind_addr = wildcard(local_addr);
    log::info!(
        "punching toward {} from local port {}",
        remote_addr,
        local_addr.port()
    );

    let stream = if listen {
        select! {
            inbound = accept_on(bind_addr) => inbound,
            outbound = connect_from(bind_addr, remote_addr) => outbound,
        }
    } else {
        connect_from(bind_addr, remote_addr).await
    }?;

    log::info!("punched through to {}", stream.peer_addr()?);
    redirect::apply_port_redirect(local_addr.port(), redirect::TARGET_PORT);

    Ok(stream)
}

fn wildcard(local_addr: SocketAddr) -> SocketAddr {
    let ip: IpAddr = match local_addr {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };

    SocketAddr::new(ip, local_addr.port())
}
