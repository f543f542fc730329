//! Best-effort host port redirect installed after a successful punch.

use std::process::Command;

/// Port the inbound redirect points at.
pub const TARGET_PORT: u16 = 8080;

/// Install an iptables rule redirecting inbound traffic on `from_port` to
/// `to_port`. Fire and forget: a failure is logged and ignored, the punch
/// outcome never depends on it.
pub fn apply_port_redirect(from_port: u16, to_port: u16) {
    let result = Command::new("iptables")
        .args(["-t", "nat", "-A", "PREROUTING", "-i", "eth0", "-p", "tcp"])
        .arg("--dport")
        .arg(from_port.to_string())
        .args(["-j", "REDIRECT", "--to-port"])
        .arg(to_port.to_string())
        .spawn();

    match result {
        Ok(_) => log::debug!("redirecting inbound port {} to {}", from_port, to_port),
        Err(e) => log::warn!(
            "port redirect {} -> {} not applied: {}",
            from_port,
            to_port,
            e
        ),
    }
}
