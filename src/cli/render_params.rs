//! Render params command
//!
//! Writes the managed params keys for a known IP without touching the
//! cluster. With `--update-values` the ingress-nginx Helm values are pointed
//! at the same static IP.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::constants::{DEFAULT_INGRESS_CLASS, DEFAULT_PARAMS_FILE};
use crate::hosts::{build_hosts, update_ingress_values, write_params};
use crate::ingress::parse_ip;

#[derive(Debug, Clone, Args)]
pub struct RenderParamsArgs {
    /// Ingress IP address the hosts are derived from
    #[arg(long)]
    pub ip: String,

    /// IngressClass to record
    #[arg(long, default_value = DEFAULT_INGRESS_CLASS)]
    pub ingress_class: String,

    /// params.env file to create or update
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PARAMS_FILE)]
    pub output: PathBuf,

    /// Also update the ingress-nginx Helm values file
    #[arg(long, requires_all = ["ingress_values", "resource_group"])]
    pub update_values: bool,

    /// ingress-nginx Helm values file
    #[arg(long, value_name = "PATH")]
    pub ingress_values: Option<PathBuf>,

    /// Resource group that owns the static public IP
    #[arg(long)]
    pub resource_group: Option<String>,
}

pub fn render_params_command(args: &RenderParamsArgs, out: &mut dyn Write) -> Result<()> {
    let ip = parse_ip(&args.ip)?;
    let hosts = build_hosts(ip);
    write_params(&args.output, &args.ingress_class, &hosts)?;
    writeln!(out, "✅ Wrote {}", args.output.display())?;

    if args.update_values {
        if let (Some(values), Some(rg)) = (&args.ingress_values, &args.resource_group) {
            update_ingress_values(ip, rg, values)?;
            writeln!(out, "✅ Updated {}", values.display())?;
        }
    }
    Ok(())
}
