//! # Ingress
//!
//! Everything concerned with the ingress controller's external address:
//!
//! - [`discovery`]: resolve the address from overrides, load balancer status or DNS
//! - [`reachability`]: reject non-public addresses and TCP-probe the result
//! - [`load_balancer`]: make the controller Service an Azure load balancer and
//!   wait for it to publish an address

pub mod discovery;
pub mod load_balancer;
pub mod reachability;

pub use discovery::resolve_ingress_ip;
pub use load_balancer::{ensure_load_balancer, LoadBalancerAddress, LoadBalancerOptions};
pub use reachability::{ensure_ingress_accessible, is_public, PortProbe, ReachabilityPolicy, TcpProbe};

use std::net::{AddrParseError, IpAddr};
use std::time::Duration;
use thiserror::Error;

use crate::tools::CommandError;

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("Invalid IP address '{value}': {source}")]
    InvalidIp {
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error(
        "Ingress controller resolved to a non-public IP address ({0}). Ensure the service publishes \
         an external address or override it with --ingress-ip/--ingress-hostname."
    )]
    NonPublicAddress(IpAddr),

    #[error(
        "Unable to reach the ingress load balancer at {ip}; attempted ports {ports}. \
         Connection errors: {errors}."
    )]
    Unreachable {
        ip: IpAddr,
        ports: String,
        errors: String,
    },

    #[error(
        "Ingress controller does not expose an external IP or hostname yet. Provide --ingress-ip \
         or wait for the service to publish an address.{hint}"
    )]
    NoAddress { hint: String },

    #[error(
        "Timed out after {}s waiting for the ingress load balancer {service} to publish an \
         external IP or hostname",
        waited.as_secs()
    )]
    LoadBalancerTimeout { service: String, waited: Duration },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Failed to write operator output: {0}")]
    Output(#[from] std::io::Error),
}

/// Parse an operator-supplied IP address
pub fn parse_ip(value: &str) -> Result<IpAddr, IngressError> {
    value
        .trim()
        .parse()
        .map_err(|source| IngressError::InvalidIp {
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ip_accepts_v4_and_v6() {
        assert_eq!(parse_ip("1.2.3.4").unwrap().to_string(), "1.2.3.4");
        assert_eq!(parse_ip(" 2001:db8::1 ").unwrap().to_string(), "2001:db8::1");
    }

    #[test]
    fn test_parse_ip_rejects_garbage() {
        let err = parse_ip("not-an-ip").unwrap_err();
        assert!(err.to_string().contains("not-an-ip"));
    }
}
