//! # kubectl
//!
//! Thin typed wrapper over the `kubectl` invocations the toolkit needs:
//! jsonpath reads, typed `Service` reads, JSON merge patches and
//! `apply -f -` with a manifest on stdin.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::Service;
use thiserror::Error;
use tracing::debug;

use super::{CommandError, CommandRunner, Invocation};

/// Reference to a namespaced resource given as `<namespace>/<name>` or
/// `<namespace>/<kind>/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Service reference '{0}' must be <namespace>/<name> or <namespace>/<resource>/<name>")]
pub struct ServiceRefError(pub String);

impl ServiceRef {
    /// `kind/name` as passed to `kubectl get`
    pub fn resource(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// `service/name`, ignoring whichever kind the reference was written with
    pub fn service_resource(&self) -> String {
        format!("service/{}", self.name)
    }
}

impl FromStr for ServiceRef {
    type Err = ServiceRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let (namespace, kind, name) = match parts.as_slice() {
            [namespace, name] => (*namespace, "service", *name),
            [namespace, kind, name] => (*namespace, *kind, *name),
            _ => return Err(ServiceRefError(s.to_string())),
        };
        if namespace.is_empty() || kind.is_empty() || name.is_empty() {
            return Err(ServiceRefError(s.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// kubectl client bound to a runner and a binary name
#[derive(Debug, Clone, Copy)]
pub struct Kubectl<'a> {
    runner: &'a dyn CommandRunner,
    binary: &'a str,
}

impl<'a> Kubectl<'a> {
    pub fn new(runner: &'a dyn CommandRunner, binary: &'a str) -> Self {
        Self { runner, binary }
    }

    fn invocation(&self) -> Invocation {
        Invocation::new(self.binary)
    }

    /// `kubectl -n <ns> get <kind>/<name> -o jsonpath=<expr>`, trimmed
    pub fn jsonpath(&self, service: &ServiceRef, expression: &str) -> Result<String, CommandError> {
        let inv = self
            .invocation()
            .args(["-n", service.namespace.as_str(), "get"])
            .arg(service.resource())
            .arg("-o")
            .arg(format!("jsonpath={expression}"));
        let output = self.runner.run_checked(&inv)?;
        let value = output.stdout.trim().to_string();
        debug!("{} {} -> {:?}", service.resource(), expression, value);
        Ok(value)
    }

    /// Fetch `service/<name>` as a typed [`Service`]
    pub fn get_service(&self, service: &ServiceRef) -> Result<Service, CommandError> {
        let inv = self
            .invocation()
            .args(["-n", service.namespace.as_str(), "get"])
            .arg(service.service_resource())
            .args(["-o", "json"]);
        let output = self.runner.run_checked(&inv)?;
        serde_json::from_str(&output.stdout).map_err(|source| CommandError::InvalidOutput {
            command: inv.render(),
            source,
        })
    }

    /// Apply a JSON merge patch to `resource` (e.g. `service/foo`)
    pub fn patch_merge(
        &self,
        namespace: &str,
        resource: &str,
        patch: &serde_json::Value,
    ) -> Result<(), CommandError> {
        let inv = self
            .invocation()
            .args(["-n", namespace, "patch", resource, "--type", "merge", "-p"])
            .arg(patch.to_string());
        self.runner.run_checked(&inv)?;
        Ok(())
    }

    /// `kubectl apply -f -` with `manifest` on stdin
    pub fn apply_stdin(&self, manifest: &str, sensitive: bool) -> Result<String, CommandError> {
        let mut inv = self.invocation().args(["apply", "-f", "-"]).stdin(manifest);
        if sensitive {
            inv = inv.sensitive();
        }
        let output = self.runner.run_checked(&inv)?;
        Ok(output.stdout.trim().to_string())
    }

    /// Run an arbitrary kubectl invocation built by the caller
    pub fn run(&self, build: impl FnOnce(Invocation) -> Invocation) -> Result<String, CommandError> {
        let inv = build(self.invocation());
        let output = self.runner.run_checked(&inv)?;
        Ok(output.stdout)
    }
}
