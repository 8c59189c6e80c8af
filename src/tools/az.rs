//! # Azure CLI
//!
//! The handful of `az` queries used while provisioning the ingress load
//! balancer. Table output is passed through to the operator untouched.

use super::{CommandError, CommandRunner, Invocation};

/// Azure CLI client bound to a runner and a binary name
#[derive(Debug, Clone, Copy)]
pub struct Az<'a> {
    runner: &'a dyn CommandRunner,
    binary: &'a str,
}

impl<'a> Az<'a> {
    pub fn new(runner: &'a dyn CommandRunner, binary: &'a str) -> Self {
        Self { runner, binary }
    }

    fn query<I, S>(&self, args: I) -> Result<String, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inv = Invocation::new(self.binary).args(args);
        let output = self.runner.run_checked(&inv)?;
        Ok(output.stdout.trim().to_string())
    }

    /// Managed node resource group of an AKS cluster, `None` when az prints nothing
    pub fn node_resource_group(
        &self,
        resource_group: &str,
        aks_name: &str,
    ) -> Result<Option<String>, CommandError> {
        let value = self.query([
            "aks",
            "show",
            "--resource-group",
            resource_group,
            "--name",
            aks_name,
            "--query",
            "nodeResourceGroup",
            "-o",
            "tsv",
        ])?;
        Ok(if value.is_empty() { None } else { Some(value) })
    }

    pub fn list_public_ips(&self, resource_group: &str) -> Result<String, CommandError> {
        self.query([
            "network",
            "public-ip",
            "list",
            "--resource-group",
            resource_group,
            "--query",
            "[].{name:name, ipAddress:ipAddress, provisioningState:provisioningState}",
            "-o",
            "table",
        ])
    }

    pub fn list_load_balancers(&self, resource_group: &str) -> Result<String, CommandError> {
        self.query([
            "network",
            "lb",
            "list",
            "--resource-group",
            resource_group,
            "--query",
            "[].{name:name, provisioningState:provisioningState}",
            "-o",
            "table",
        ])
    }

    pub fn list_frontend_ips(
        &self,
        resource_group: &str,
        lb_name: &str,
    ) -> Result<String, CommandError> {
        self.query([
            "network",
            "lb",
            "frontend-ip",
            "list",
            "--resource-group",
            resource_group,
            "--lb-name",
            lb_name,
            "-o",
            "table",
        ])
    }

    pub fn list_lb_rules(&self, resource_group: &str, lb_name: &str) -> Result<String, CommandError> {
        self.query([
            "network",
            "lb",
            "rule",
            "list",
            "--resource-group",
            resource_group,
            "--lb-name",
            lb_name,
            "-o",
            "table",
        ])
    }
}
