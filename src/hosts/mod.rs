//! # Hosts
//!
//! Derives the demo hostnames from the ingress IP and keeps every file that
//! mentions them in sync.
//!
//! Each service gets a `nip.io` wildcard name, `<prefix>.<ip>.nip.io`, so no
//! DNS records have to be managed when the load balancer address rotates.

pub mod params;
pub mod rewrite;
pub mod stale;

pub use params::{build_params, read_ingress_class, update_ingress_values, write_params, ParamsFile};
pub use rewrite::update_manifest_hosts;
pub use stale::{discover_stale_hosts, ensure_hosts_rotated, StaleHost, StaleHostsError};

use std::net::IpAddr;

use crate::constants::NIP_IO_SUFFIX;

/// Services that get a generated hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostService {
    Keycloak,
    Midpoint,
    Argocd,
}

impl HostService {
    pub const ALL: [HostService; 3] = [HostService::Keycloak, HostService::Midpoint, HostService::Argocd];

    /// Leading DNS label of the generated hostname
    pub fn prefix(self) -> &'static str {
        match self {
            HostService::Keycloak => "kc",
            HostService::Midpoint => "mp",
            HostService::Argocd => "argocd",
        }
    }

    /// Key in `params.env`
    pub fn params_key(self) -> &'static str {
        match self {
            HostService::Keycloak => "keycloakHost",
            HostService::Midpoint => "midpointHost",
            HostService::Argocd => "argocdHost",
        }
    }
}

/// Hostnames derived from a single ingress IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hosts {
    pub keycloak: String,
    pub midpoint: String,
    pub argocd: String,
}

impl Hosts {
    pub fn get(&self, service: HostService) -> &str {
        match service {
            HostService::Keycloak => &self.keycloak,
            HostService::Midpoint => &self.midpoint,
            HostService::Argocd => &self.argocd,
        }
    }

    pub fn keycloak_url(&self) -> String {
        format!("http://{}", self.keycloak)
    }

    /// midPoint is served under `/midpoint`
    pub fn midpoint_url(&self) -> String {
        format!("http://{}/midpoint", self.midpoint)
    }

    /// The ingress only serves HTTP for Argo CD; TLS terminates upstream
    pub fn argocd_url(&self) -> String {
        format!("http://{}", self.argocd)
    }
}

/// Return nip.io hosts for the provided IP address
pub fn build_hosts(ip: IpAddr) -> Hosts {
    let host = |service: HostService| format!("{}.{ip}.{NIP_IO_SUFFIX}", service.prefix());
    Hosts {
        keycloak: host(HostService::Keycloak),
        midpoint: host(HostService::Midpoint),
        argocd: host(HostService::Argocd),
    }
}
