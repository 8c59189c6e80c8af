//! # Reachability
//!
//! Validates that the discovered ingress address is public and accepts TCP
//! connections on at least one port.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::IngressError;

/// What to do when every port probe fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityPolicy {
    Enforce,
    /// Log a warning and continue; non-public addresses still fail
    WarnOnly,
}

/// Connectivity check against a single socket address
pub trait PortProbe: std::fmt::Debug {
    fn probe(&self, addr: SocketAddr) -> io::Result<()>;
}

/// Plain TCP connect with a timeout
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    pub timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PortProbe for TcpProbe {
    fn probe(&self, addr: SocketAddr) -> io::Result<()> {
        TcpStream::connect_timeout(&addr, self.timeout).map(drop)
    }
}

/// Check the address is public and reachable
///
/// Returns the first port that accepted a connection, or `None` when all
/// probes failed under [`ReachabilityPolicy::WarnOnly`].
pub fn ensure_ingress_accessible(
    ip: IpAddr,
    ports: &[u16],
    policy: ReachabilityPolicy,
    probe: &dyn PortProbe,
) -> Result<Option<u16>, IngressError> {
    if !is_public(ip) {
        return Err(IngressError::NonPublicAddress(ip));
    }

    let mut failures = Vec::new();
    for &port in ports {
        let addr = SocketAddr::new(ip, port);
        match probe.probe(addr) {
            Ok(()) => {
                info!("Ingress load balancer {} accepts TCP connections on port {}", ip, port);
                return Ok(Some(port));
            }
            Err(e) => {
                debug!("TCP probe {} failed: {}", addr, e);
                failures.push(format!("{port}/tcp: {e}"));
            }
        }
    }

    let err = IngressError::Unreachable {
        ip,
        ports: ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        errors: failures.join("; "),
    };

    match policy {
        ReachabilityPolicy::Enforce => Err(err),
        ReachabilityPolicy::WarnOnly => {
            warn!("{}", err);
            Ok(None)
        }
    }
}

/// Whether the address is routable on the public internet
///
/// Private, loopback, link-local, multicast and unspecified addresses are
/// rejected, along with the IANA special-purpose blocks (documentation,
/// benchmarking, reserved, broadcast, unique-local).
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, d] = ip.octets();
    let special = ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        // 0.0.0.0/8
        || a == 0
        // 192.0.0.0/24 except the two globally routable anycast addresses
        || (a == 192 && b == 0 && c == 0 && d != 9 && d != 10)
        // 198.18.0.0/15
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4
        || a >= 240;
    !special
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_v4(v4);
    }
    let segments = ip.segments();
    let special = ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (segments[0] & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (segments[0] & 0xffc0) == 0xfe80
        // 2001:db8::/32 documentation
        || (segments[0] == 0x2001 && segments[1] == 0x0db8)
        // 2001::/23 IETF protocol assignments
        || (segments[0] == 0x2001 && segments[1] < 0x0200)
        // 2002::/16 6to4
        || segments[0] == 0x2002
        // 100::/64 discard
        || (segments[0] == 0x0100 && segments[1] == 0 && segments[2] == 0 && segments[3] == 0);
    !special
}
