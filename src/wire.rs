//! Line-oriented wire format shared by the mediator and the peers.
//!
//! Every message is one newline-terminated UTF-8 line. Address tuples are
//! `~~`-joined: `ip~~public_port~~local_port`. The listener-capable peer's
//! handshake carries two tuples in one line (its own, then the counterpart's).

use std::fmt;
use std::io::{Error, ErrorKind::InvalidData, Result};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

pub const SEPARATOR: &str = "~~";

/// First line the listener-capable peer sends on its punch channel.
pub const PROBE: &str = "two";

/// Acknowledgment the listener-capable peer sends back on its discussion
/// channel after receiving the handshake.
pub const ACK: &str = "ackTwo";

/// A peer's address as observed by the mediator on the punch listener.
///
/// `local_port` is the port the counterpart dials and the port its owner
/// rebinds to when punching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedAddr {
    pub ip: IpAddr,
    pub public_port: u16,
    pub local_port: u16,
}

impl ObservedAddr {
    /// The endpoint a counterpart connects to when punching toward this peer.
    pub fn connect_target(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.local_port)
    }

    fn from_tokens(tokens: &[&str]) -> Result<Self> {
        let ip = tokens[0]
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| malformed())?;

        Ok(Self {
            ip,
            public_port: parse_port(tokens[1])?,
            local_port: parse_port(tokens[2])?,
        })
    }
}

impl fmt::Display for ObservedAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.ip, SEPARATOR, self.public_port, SEPARATOR, self.local_port
        )
    }
}

impl FromStr for ObservedAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.trim().split(SEPARATOR).collect();
        if tokens.len() != 3 {
            return Err(malformed());
        }

        Self::from_tokens(&tokens)
    }
}

/// Handshake line for the listener-capable peer: its own observed tuple at
/// fields 0-2, the counterpart's at fields 3-5.
pub fn encode_pair(own: &ObservedAddr, peer: &ObservedAddr) -> String {
    format!("{}{}{}", own, SEPARATOR, peer)
}

pub fn decode_pair(line: &str) -> Result<(ObservedAddr, ObservedAddr)> {
    let tokens: Vec<&str> = line.trim().split(SEPARATOR).collect();
    if tokens.len() != 6 {
        return Err(malformed());
    }

    Ok((
        ObservedAddr::from_tokens(&tokens[..3])?,
        ObservedAddr::from_tokens(&tokens[3..])?,
    ))
}

fn parse_port(token: &str) -> Result<u16> {
    match token.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(malformed()),
        Ok(p) => Ok(p),
    }
}

fn malformed() -> Error {
    Error::new(InvalidData, "malformed address message")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_v4() {
        let addr = ObservedAddr {
            ip: "203.0.113.5".parse().unwrap(),
            public_port: 4000,
            local_port: 5000,
        };

        let line = addr.to_string();
        assert_eq!(line, "203.0.113.5~~4000~~5000");
        assert_eq!(line.parse::<ObservedAddr>().unwrap(), addr);
    }

    #[test]
    fn round_trip_v6() {
        let addr = ObservedAddr {
            ip: "2001:db8::1".parse().unwrap(),
            public_port: 1,
            local_port: 65535,
        };

        assert_eq!(addr.to_string().parse::<ObservedAddr>().unwrap(), addr);
    }

    #[test]
    fn tokens_are_trimmed() {
        let addr: ObservedAddr = " 203.0.113.5 ~~ 4000 ~~ 5000 \n".parse().unwrap();
        assert_eq!(addr.ip, "203.0.113.5".parse::<std::net::IpAddr>().unwrap());
        assert_eq!(addr.public_port, 4000);
        assert_eq!(addr.local_port, 5000);
    }

    #[test]
    fn connect_target_uses_local_port() {
        let addr: ObservedAddr = "203.0.113.5~~4000~~5000".parse().unwrap();
        assert_eq!(addr.connect_target(), "203.0.113.5:5000".parse().unwrap());
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "",
            "203.0.113.5",
            "203.0.113.5~~4000",
            "203.0.113.5~~4000~~5000~~6000",
            "not-an-ip~~4000~~5000",
            "203.0.113.5~~x~~5000",
            "203.0.113.5~~4000~~0",
            "203.0.113.5~~70000~~5000",
        ] {
            let err = line.parse::<ObservedAddr>().unwrap_err();
            assert_eq!(err.kind(), InvalidData, "{:?}", line);
        }
    }

    #[test]
    fn pair_round_trip() {
        let own: ObservedAddr = "198.51.100.7~~4242~~4242".parse().unwrap();
        let peer: ObservedAddr = "203.0.113.5~~4000~~5000".parse().unwrap();

        let line = encode_pair(&own, &peer);
        assert_eq!(line, "198.51.100.7~~4242~~4242~~203.0.113.5~~4000~~5000");

        let (got_own, got_peer) = decode_pair(&line).unwrap();
        assert_eq!(got_own, own);
        assert_eq!(got_peer, peer);
    }

    #[test]
    fn pair_rejects_single_tuple() {
        assert_eq!(
            decode_pair("203.0.113.5~~4000~~5000").unwrap_err().kind(),
            InvalidData
        );
    }
}
