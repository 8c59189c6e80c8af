//! # Ingress Address Discovery
//!
//! Resolution order:
//!
//! 1. explicit `--ingress-ip` (validated, kubectl never called)
//! 2. `status.loadBalancer.ingress[*].ip`, last valid candidate wins
//! 3. explicit `--ingress-hostname`, then `status.loadBalancer.ingress[*].hostname`, via DNS
//!
//! When nothing resolves, the error carries the service type and raw load
//! balancer status so the operator can see what the cluster reported.

use std::net::{IpAddr, ToSocketAddrs};

use tracing::{debug, info, warn};

use super::{parse_ip, IngressError};
use crate::tools::{Kubectl, ServiceRef};

const STATUS_IPS: &str = "{.status.loadBalancer.ingress[*].ip}";
const STATUS_HOSTNAMES: &str = "{.status.loadBalancer.ingress[*].hostname}";
const SPEC_TYPE: &str = "{.spec.type}";
const STATUS_LOAD_BALANCER: &str = "{.status.loadBalancer}";

/// Discover the ingress IP using kubectl or the supplied overrides
pub fn resolve_ingress_ip(
    kubectl: &Kubectl<'_>,
    service: &ServiceRef,
    explicit_ip: Option<&str>,
    explicit_hostname: Option<&str>,
) -> Result<IpAddr, IngressError> {
    if let Some(ip) = explicit_ip.filter(|v| !v.trim().is_empty()) {
        return parse_ip(ip);
    }

    let ip_values = kubectl.jsonpath(service, STATUS_IPS).unwrap_or_else(|e| {
        debug!("Unable to read load balancer IPs for {}: {}", service, e);
        String::new()
    });
    if let Some(ip) = last_valid_ip(&ip_values) {
        info!("Load balancer status for {} reports {}", service, ip);
        return Ok(ip);
    }

    let mut hostnames: Vec<String> = explicit_hostname
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim().to_string())
        .into_iter()
        .collect();
    let hostname_values = kubectl.jsonpath(service, STATUS_HOSTNAMES).unwrap_or_else(|e| {
        debug!("Unable to read load balancer hostnames for {}: {}", service, e);
        String::new()
    });
    hostnames.extend(split_candidates(&hostname_values).map(str::to_string));

    for hostname in &hostnames {
        match resolve_hostname(hostname) {
            Some(ip) => {
                info!("Resolved ingress hostname {} to {}", hostname, ip);
                return Ok(ip);
            }
            None => warn!("Unable to resolve ingress hostname {}", hostname),
        }
    }

    Err(IngressError::NoAddress {
        hint: status_hint(kubectl, service),
    })
}

/// Split kubectl jsonpath output on whitespace and commas
pub fn split_candidates(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|v| !v.is_empty())
}

/// Last parseable IP in the candidate list
///
/// The most recently listed address is the one the cloud provider assigned last.
pub fn last_valid_ip(raw: &str) -> Option<IpAddr> {
    split_candidates(raw)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .find_map(|candidate| candidate.parse().ok())
}

/// Resolve a hostname through the system resolver, preferring IPv4
pub fn resolve_hostname(hostname: &str) -> Option<IpAddr> {
    let addrs: Vec<IpAddr> = match (hostname, 0u16).to_socket_addrs() {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(e) => {
            debug!("DNS lookup for {} failed: {}", hostname, e);
            return None;
        }
    };
    addrs
        .iter()
        .copied()
        .find(IpAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
}

fn status_hint(kubectl: &Kubectl<'_>, service: &ServiceRef) -> String {
    let mut hint = String::new();

    let svc_type = match kubectl.jsonpath(service, SPEC_TYPE) {
        Ok(value) => value,
        Err(e) => {
            hint.push_str(&format!(" Unable to query service type: {e}."));
            String::new()
        }
    };

    match kubectl.jsonpath(service, STATUS_LOAD_BALANCER) {
        Ok(state) if !state.is_empty() => {
            hint.push_str(&format!(" Current loadBalancer status: {state}."));
        }
        Ok(_) => {}
        Err(e) => hint.push_str(&format!(" Unable to query load balancer status: {e}.")),
    }

    if !svc_type.is_empty() {
        hint.push_str(&format!(" Service type: {svc_type}."));
    }
    hint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_valid_ip_prefers_most_recent_candidate() {
        let ip = last_valid_ip("198.51.100.7 203.0.113.10").unwrap();
        assert_eq!(ip.to_string(), "203.0.113.10");
    }

    #[test]
    fn test_last_valid_ip_skips_invalid_trailing_values() {
        let ip = last_valid_ip("20.1.2.3,\n pending").unwrap();
        assert_eq!(ip.to_string(), "20.1.2.3");
        assert!(last_valid_ip("   ").is_none());
    }

    #[test]
    fn test_resolve_hostname_localhost() {
        let ip = resolve_hostname("localhost").unwrap();
        assert!(ip.is_loopback());
    }
}
