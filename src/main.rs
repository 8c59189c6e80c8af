//! # iamctl
//!
//! Entry point for the IAM demo operations toolkit. See [`iam_demo_ops::cli`]
//! for the available subcommands.

use std::io;

use anyhow::Result;
use clap::Parser;

use iam_demo_ops::cli::{self, Cli};
use iam_demo_ops::config::OpsConfig;
use iam_demo_ops::observability::init_logging;
use iam_demo_ops::tools::SystemRunner;

fn main() -> Result<()> {
    let config = OpsConfig::from_env();
    init_logging(&config)?;
    config.warn_rejected();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli::run(cli, &config, &SystemRunner, &mut out)
}
