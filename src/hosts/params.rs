//! # Params Files
//!
//! `params.env` files feed kustomize replacements with the ingress class and
//! generated hostnames. They are plain `KEY=VALUE` lines with `#` comments.
//!
//! Existing files are upserted: the managed keys are updated in place and
//! every other line (comments, unrelated keys) is preserved. New files get a
//! canonical header. All writes go through a temp file in the target
//! directory followed by a rename, so readers never see a partial file.

use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{build_hosts, HostService, Hosts};
use crate::constants::AZURE_LB_RESOURCE_GROUP_ANNOTATION;

pub const INGRESS_CLASS_KEY: &str = "ingressClass";

/// Keys every params file must define
pub const REQUIRED_KEYS: [&str; 4] = [INGRESS_CLASS_KEY, "keycloakHost", "midpointHost", "argocdHost"];

const HEADER: [&str; 3] = [
    "# Ingress parameters for the IAM demo environment.",
    "# Hosts rotate via `iamctl configure-hosts`; update ingressClass here if",
    "# your cluster uses a different controller.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamsLine {
    Entry { key: String, value: String },
    /// Comments, blank lines and anything that is not `KEY=VALUE`
    Verbatim(String),
}

/// Ordered `KEY=VALUE` document that round-trips comments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamsFile {
    lines: Vec<ParamsLine>,
}

impl ParamsFile {
    pub fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|raw| {
                let line = raw.trim();
                if line.is_empty() || line.starts_with('#') {
                    return ParamsLine::Verbatim(raw.to_string());
                }
                match line.split_once('=') {
                    Some((key, value)) => ParamsLine::Entry {
                        key: key.trim().to_string(),
                        value: value.trim().to_string(),
                    },
                    None => ParamsLine::Verbatim(raw.to_string()),
                }
            })
            .collect();
        Self { lines }
    }

    /// Read and parse a params file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read params file: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// First value recorded for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            ParamsLine::Entry { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Update `key` wherever it appears, or append it
    pub fn set(&mut self, key: &str, value: &str) {
        let mut found = false;
        for line in &mut self.lines {
            if let ParamsLine::Entry { key: k, value: v } = line {
                if k == key {
                    *v = value.to_string();
                    found = true;
                }
            }
        }
        if !found {
            self.lines.push(ParamsLine::Entry {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }

    /// Serialize with a trailing newline
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                ParamsLine::Entry { key, value } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                }
                ParamsLine::Verbatim(text) => out.push_str(text),
            }
            out.push('\n');
        }
        out
    }

    fn apply_hosts(&mut self, ingress_class: &str, hosts: &Hosts) {
        self.set(INGRESS_CLASS_KEY, ingress_class);
        for service in HostService::ALL {
            self.set(service.params_key(), hosts.get(service));
        }
    }
}

/// `ingressClass` recorded in a params file, `None` when the file is missing
pub fn read_ingress_class(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let params = ParamsFile::load(path)?;
    Ok(params
        .get(INGRESS_CLASS_KEY)
        .filter(|v| !v.is_empty())
        .map(str::to_string))
}

/// Canonical content of a fresh params file for `ip`
pub fn build_params(ip: IpAddr, ingress_class: &str) -> String {
    render_fresh(ingress_class, &build_hosts(ip))
}

fn render_fresh(ingress_class: &str, hosts: &Hosts) -> String {
    let mut params = ParamsFile::parse(&HEADER.join("\n"));
    params.apply_hosts(ingress_class, hosts);
    params.render()
}

/// Write the managed keys into `path`, creating it when missing
pub fn write_params(path: &Path, ingress_class: &str, hosts: &Hosts) -> Result<()> {
    let content = if path.exists() {
        let mut params = ParamsFile::load(path)?;
        params.apply_hosts(ingress_class, hosts);
        params.render()
    } else {
        debug!("Creating params file {}", path.display());
        render_fresh(ingress_class, hosts)
    };
    write_atomic(path, &content)?;
    info!("Updated params file {}", path.display());
    Ok(())
}

/// Point the ingress-nginx Helm values at a static IP in `resource_group`
///
/// Sets `controller.service.loadBalancerIP` and the Azure resource group
/// annotation, keeping all other keys.
pub fn update_ingress_values(ip: IpAddr, resource_group: &str, values_path: &Path) -> Result<()> {
    let content = fs::read_to_string(values_path)
        .with_context(|| format!("Failed to read Helm values: {}", values_path.display()))?;
    let mut root: Value = if content.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse Helm values: {}", values_path.display()))?
    };
    if root.is_null() {
        root = Value::Mapping(Mapping::new());
    }

    let root_map = root
        .as_mapping_mut()
        .ok_or_else(|| anyhow::anyhow!("Helm values root must be a mapping: {}", values_path.display()))?;
    let controller = child_mapping(root_map, "controller")?;
    let service = child_mapping(controller, "service")?;
    service.insert(Value::from("loadBalancerIP"), Value::from(ip.to_string()));
    let annotations = child_mapping(service, "annotations")?;
    annotations.insert(
        Value::from(AZURE_LB_RESOURCE_GROUP_ANNOTATION),
        Value::from(resource_group),
    );

    let rendered = serde_yaml::to_string(&root).context("Failed to serialize Helm values")?;
    write_atomic(values_path, &rendered)?;
    info!(
        "Updated {} with loadBalancerIP {} in resource group {}",
        values_path.display(),
        ip,
        resource_group
    );
    Ok(())
}

/// Nested mapping under `key`, created when absent or null
fn child_mapping<'a>(map: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping> {
    match map.get(key) {
        Some(Value::Mapping(_)) => {}
        None | Some(Value::Null) => {
            map.insert(Value::from(key), Value::Mapping(Mapping::new()));
        }
        Some(_) => anyhow::bail!("Helm values key '{key}' must be a mapping"),
    }
    map.get_mut(key)
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| anyhow::anyhow!("Helm values key '{key}' must be a mapping"))
}

/// Replace `path` with `content` via a temp file in the same directory
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
