//!TCP NAT traversal by hole punching, with a rendezvous mediator.
//!
//!Two peers behind NAT or firewall cannot accept inbound connections. A
//!publicly reachable mediator observes each peer's address on a dedicated
//!punch connection and hands each peer the other's tuple over a discussion
//!connection. The peers then close their punch sockets, rebind the same
//!local port with address reuse, and dial each other directly: the NAT
//!mapping opened toward the mediator lets the simultaneous open through.
//!
//!## How a session runs
//!The mediator pairs exactly two peers per run, labeled by arrival order.
//!Once both punch connections are recorded it sends each discussion channel
//!the counterpart's `ip~~public_port~~local_port` line and steps out of the
//!data path.
//!
//!The essential is that a peer uses the same local port to talk to the
//!mediator and to the counterpart. This relies on SO_REUSEADDR (and
//!SO_REUSEPORT on unix), so it is OS dependent.
//!
//!One peer runs the plain role (dial only), the other the listener-capable
//!role (dial while also re-listening on the punch port); together they cover
//!NAT pairs that want either end to open actively.

pub mod data;
pub mod mediator;
pub mod peer;
pub mod punch;
pub mod redirect;
pub mod wire;
