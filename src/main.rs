use std::io::Result;
use std::net::IpAddr;
use structopt::StructOpt;

use holepunch::mediator::Server;
use holepunch::peer::{Peer, Role};

#[derive(StructOpt, Debug)]
#[structopt(name = "holepunch")]
enum Opt {
    /// Run the rendezvous mediator
    Mediator(MediatorOpt),
    /// Run a peer
    Peer(PeerOpt),
}

#[derive(StructOpt, Debug)]
struct MediatorOpt {
    #[structopt(long = "listen-ip", default_value = "0.0.0.0")]
    listen_ip: IpAddr,

    #[structopt(long = "discussion-port", default_value = "9000")]
    discussion_port: u16,

    #[structopt(long = "punch-port", default_value = "9001")]
    punch_port: u16,
}

#[derive(StructOpt, Debug)]
struct PeerOpt {
    #[structopt(long = "mediator-ip", default_value = "127.0.0.1")]
    mediator_ip: IpAddr,

    #[structopt(long = "discussion-port", default_value = "9000")]
    discussion_port: u16,

    #[structopt(long = "punch-port", default_value = "9001")]
    punch_port: u16,

    /// Run the listener-capable role (start the plain peer first)
    #[structopt(long = "listen")]
    listen: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opt: Opt = StructOpt::from_args();

    match opt {
        Opt::Mediator(opt) => run_mediator(opt).await,
        Opt::Peer(opt) => run_peer(opt).await,
    }
}

async fn run_mediator(opt: MediatorOpt) -> Result<()> {
    let s = Server::new(opt.listen_ip, opt.discussion_port, opt.punch_port).await?;
    s.run().await
}

async fn run_peer(opt: PeerOpt) -> Result<()> {
    let role = if opt.listen {
        Role::Listen
    } else {
        Role::Connect
    };

    let peer = Peer::connect(opt.mediator_ip, opt.discussion_port, opt.punch_port, role).await?;
    peer.run().await
}
