//! # Load Balancer Provisioning
//!
//! Makes sure the ingress controller Service is backed by an Azure load
//! balancer:
//!
//! 1. discover the AKS node resource group (optional, needs `az`)
//! 2. patch `spec.type` to `LoadBalancer` when it is anything else
//! 3. pin the Service to the node resource group via annotation
//! 4. poll until the load balancer publishes an IP or hostname
//!
//! Azure diagnostics are printed inside a GitHub Actions log group whenever a
//! node resource group is known, both on success and before reporting a
//! timeout.

use std::fmt;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use k8s_openapi::api::core::v1::Service;
use serde_json::json;
use tracing::{debug, info, warn};

use super::IngressError;
use crate::constants::{
    AKS_LOAD_BALANCER_NAME, AZURE_LB_RESOURCE_GROUP_ANNOTATION, DEFAULT_LOAD_BALANCER_INTERVAL_SECS,
    DEFAULT_LOAD_BALANCER_TIMEOUT_SECS,
};
use crate::tools::{Az, Kubectl, ServiceRef};

const LOAD_BALANCER: &str = "LoadBalancer";

#[derive(Debug, Clone)]
pub struct LoadBalancerOptions {
    pub service: ServiceRef,
    /// Resource group holding the AKS control plane
    pub resource_group: Option<String>,
    pub aks_name: Option<String>,
    pub timeout: Duration,
    pub interval: Duration,
}

impl LoadBalancerOptions {
    pub fn new(service: ServiceRef) -> Self {
        Self {
            service,
            resource_group: None,
            aks_name: None,
            timeout: Duration::from_secs(DEFAULT_LOAD_BALANCER_TIMEOUT_SECS),
            interval: Duration::from_secs(DEFAULT_LOAD_BALANCER_INTERVAL_SECS),
        }
    }
}

/// Address published in the Service's load balancer status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadBalancerAddress {
    Ip(String),
    Hostname(String),
}

impl fmt::Display for LoadBalancerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBalancerAddress::Ip(ip) => write!(f, "external IP {ip}"),
            LoadBalancerAddress::Hostname(host) => write!(f, "hostname {host}"),
        }
    }
}

/// Ensure the ingress Service is a reachable Azure load balancer
///
/// Operator-facing progress is written to `out`.
pub fn ensure_load_balancer(
    kubectl: &Kubectl<'_>,
    az: &Az<'_>,
    options: &LoadBalancerOptions,
    out: &mut dyn Write,
) -> Result<LoadBalancerAddress, IngressError> {
    let target = &options.service;
    let node_rg = discover_node_resource_group(az, options, out)?;

    writeln!(
        out,
        "ℹ️  Ensuring ingress service {target} is backed by an Azure load balancer."
    )?;
    let mut service = kubectl.get_service(target)?;

    if ensure_service_type(kubectl, &service, target, out)? {
        service = kubectl.get_service(target)?;
    }

    if let Some(rg) = node_rg.as_deref() {
        ensure_annotation(kubectl, &service, target, rg, out)?;
    }

    match wait_for_load_balancer(kubectl, options) {
        Ok(address) => {
            writeln!(out, "✅ Load balancer exposes {address}")?;
            if let Some(rg) = node_rg.as_deref() {
                emit_azure_diagnostics(az, rg, out)?;
            }
            Ok(address)
        }
        Err(err) => {
            writeln!(out, "⚠️  {err}")?;
            if let Some(rg) = node_rg.as_deref() {
                emit_azure_diagnostics(az, rg, out)?;
            }
            Err(err)
        }
    }
}

fn discover_node_resource_group(
    az: &Az<'_>,
    options: &LoadBalancerOptions,
    out: &mut dyn Write,
) -> Result<Option<String>, IngressError> {
    let (Some(rg), Some(aks)) = (
        options.resource_group.as_deref().filter(|v| !v.is_empty()),
        options.aks_name.as_deref().filter(|v| !v.is_empty()),
    ) else {
        debug!("Resource group or AKS name not set, skipping node resource group discovery");
        return Ok(None);
    };

    match az.node_resource_group(rg, aks) {
        Ok(Some(node_rg)) => {
            writeln!(out, "ℹ️  AKS node resource group: {node_rg}")?;
            Ok(Some(node_rg))
        }
        Ok(None) => Ok(None),
        Err(e) => {
            warn!("Unable to discover node resource group: {}", e);
            writeln!(out, "⚠️  Unable to discover node resource group: {e}")?;
            Ok(None)
        }
    }
}

fn service_type(service: &Service) -> Option<&str> {
    service.spec.as_ref().and_then(|spec| spec.type_.as_deref())
}

/// Patch `spec.type` to `LoadBalancer`; returns whether a patch was applied
fn ensure_service_type(
    kubectl: &Kubectl<'_>,
    service: &Service,
    target: &ServiceRef,
    out: &mut dyn Write,
) -> Result<bool, IngressError> {
    let current = service_type(service);
    if current == Some(LOAD_BALANCER) {
        return Ok(false);
    }
    writeln!(
        out,
        "ℹ️  Updating {target} service type from {} to {LOAD_BALANCER}",
        current.unwrap_or("unknown")
    )?;
    kubectl.patch_merge(
        &target.namespace,
        &target.service_resource(),
        &json!({ "spec": { "type": LOAD_BALANCER } }),
    )?;
    Ok(true)
}

/// Pin the Service to `resource_group`; returns whether a patch was applied
fn ensure_annotation(
    kubectl: &Kubectl<'_>,
    service: &Service,
    target: &ServiceRef,
    resource_group: &str,
    out: &mut dyn Write,
) -> Result<bool, IngressError> {
    let current = service
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(AZURE_LB_RESOURCE_GROUP_ANNOTATION));
    if current.map(String::as_str) == Some(resource_group) {
        return Ok(false);
    }
    writeln!(
        out,
        "ℹ️  Setting annotation {AZURE_LB_RESOURCE_GROUP_ANNOTATION}='{resource_group}' on service {target}"
    )?;
    kubectl.patch_merge(
        &target.namespace,
        &target.service_resource(),
        &json!({ "metadata": { "annotations": { AZURE_LB_RESOURCE_GROUP_ANNOTATION: resource_group } } }),
    )?;
    Ok(true)
}

fn wait_for_load_balancer(
    kubectl: &Kubectl<'_>,
    options: &LoadBalancerOptions,
) -> Result<LoadBalancerAddress, IngressError> {
    let service = &options.service;
    let started = Instant::now();
    let deadline = started + options.timeout;

    while Instant::now() < deadline {
        let ip = kubectl
            .jsonpath(service, "{.status.loadBalancer.ingress[0].ip}")
            .unwrap_or_default();
        if !ip.is_empty() {
            info!("Load balancer for {} exposes external IP {}", service, ip);
            return Ok(LoadBalancerAddress::Ip(ip));
        }

        let hostname = kubectl
            .jsonpath(service, "{.status.loadBalancer.ingress[0].hostname}")
            .unwrap_or_default();
        if !hostname.is_empty() {
            info!("Load balancer for {} exposes hostname {}", service, hostname);
            return Ok(LoadBalancerAddress::Hostname(hostname));
        }

        debug!(
            "Load balancer for {} not ready after {}s, retrying in {}s",
            service,
            started.elapsed().as_secs(),
            options.interval.as_secs()
        );
        thread::sleep(options.interval);
    }

    Err(IngressError::LoadBalancerTimeout {
        service: service.to_string(),
        waited: options.timeout,
    })
}

/// Print public IPs, load balancers and the AKS-managed LB's frontends and rules
pub fn emit_azure_diagnostics(
    az: &Az<'_>,
    node_resource_group: &str,
    out: &mut dyn Write,
) -> Result<(), IngressError> {
    writeln!(out, "::group::Azure load balancer diagnostics")?;

    let sections = [
        (
            "📡 Public IP addresses:",
            "Unable to list public IPs",
            az.list_public_ips(node_resource_group),
        ),
        (
            "📦 Load balancers:",
            "Unable to list load balancers",
            az.list_load_balancers(node_resource_group),
        ),
        (
            "🔀 Frontend IP configurations (kubernetes LB):",
            "Unable to inspect kubernetes load balancer frontends",
            az.list_frontend_ips(node_resource_group, AKS_LOAD_BALANCER_NAME),
        ),
        (
            "🚦 Inbound rules (kubernetes LB):",
            "Unable to inspect kubernetes load balancer rules",
            az.list_lb_rules(node_resource_group, AKS_LOAD_BALANCER_NAME),
        ),
    ];

    for (title, failure, result) in sections {
        match result {
            Ok(table) => {
                writeln!(out, "{title}")?;
                writeln!(out, "{}", if table.is_empty() { "(none)" } else { table.as_str() })?;
            }
            Err(e) => {
                let detail = e.stderr().map_or_else(|| e.to_string(), str::to_string);
                writeln!(out, "⚠️  {failure}: {detail}")?;
            }
        }
    }

    writeln!(out, "::endgroup::")?;
    Ok(())
}
