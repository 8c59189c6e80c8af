//! Ensure load balancer command

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::config::OpsConfig;
use crate::constants::{
    DEFAULT_INGRESS_SERVICE, DEFAULT_LOAD_BALANCER_INTERVAL_SECS, DEFAULT_LOAD_BALANCER_TIMEOUT_SECS,
};
use crate::ingress::{ensure_load_balancer, LoadBalancerOptions};
use crate::tools::{Az, CommandRunner, Kubectl, ServiceRef};

#[derive(Debug, Clone, Args)]
pub struct EnsureLoadBalancerArgs {
    /// Ingress Service as <namespace>/<name> or <namespace>/<kind>/<name>
    #[arg(long, value_name = "REF", default_value = DEFAULT_INGRESS_SERVICE)]
    pub ingress_service: ServiceRef,

    /// Azure resource group that contains the AKS control plane
    #[arg(long, env = "RESOURCE_GROUP")]
    pub resource_group: Option<String>,

    /// AKS cluster name
    #[arg(long, env = "AKS_NAME")]
    pub aks_name: Option<String>,

    /// Seconds to wait for the load balancer to expose an address
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_LOAD_BALANCER_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Polling interval in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_LOAD_BALANCER_INTERVAL_SECS)]
    pub interval: u64,
}

impl EnsureLoadBalancerArgs {
    pub fn options(&self) -> LoadBalancerOptions {
        LoadBalancerOptions {
            resource_group: self.resource_group.clone(),
            aks_name: self.aks_name.clone(),
            timeout: Duration::from_secs(self.timeout),
            interval: Duration::from_secs(self.interval.max(1)),
            ..LoadBalancerOptions::new(self.ingress_service.clone())
        }
    }
}

pub fn ensure_load_balancer_command(
    args: &EnsureLoadBalancerArgs,
    config: &OpsConfig,
    runner: &dyn CommandRunner,
    out: &mut dyn Write,
) -> Result<()> {
    let kubectl = Kubectl::new(runner, &config.kubectl_bin);
    let az = Az::new(runner, &config.az_bin);
    ensure_load_balancer(&kubectl, &az, &args.options(), out)?;
    Ok(())
}
