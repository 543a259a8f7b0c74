// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! edgepkg - Component lifecycle CLI for edge devices

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_candidates;
mod cmd_prepare;
mod cmd_show;

use cmd_candidates::CmdCandidates;
use cmd_prepare::CmdPrepare;
use cmd_show::CmdShow;


#[derive(Parser)]
#[clap(
    name = "edgepkg",
    about = "Component lifecycle manager for edge devices",
    version,
    long_about = "Resolve component versions and prepare their recipes and artifacts on the device"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long)]
    quiet: bool,
}

#[derive(Parser, Clone, Debug, Default)]
pub struct StoreFlags {
    /// Configuration file (edgepkg.yaml)
    #[clap(long, env = "EDGEPKG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root of the local component store
    #[clap(long, env = "EDGEPKG_ROOT")]
    pub root: Option<PathBuf>,

    /// Mirror directory to use as the component catalog
    #[clap(long, env = "EDGEPKG_MIRROR")]
    pub mirror: Option<PathBuf>,
}

impl StoreFlags {
    /// Load the configuration file, if any, and apply overrides.
    pub fn load_config(&self) -> Result<edgepkg::Config> {
        let mut config = match &self.config {
            Some(path) => edgepkg::Config::load(path)?,
            None => edgepkg::Config::default(),
        };
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(mirror) = &self.mirror {
            config.mirror = Some(mirror.clone());
        }
        tracing::debug!(?config, "using configuration");
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Fetch recipes and artifacts for components
    Prepare(CmdPrepare),

    /// List candidate versions of a component
    Candidates(CmdCandidates),

    /// Display a stored recipe
    Show(CmdShow),
}

impl Opt {
    async fn run(self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        // Dispatch to command
        match self.cmd {
            Command::Prepare(mut cmd) => cmd.run().await,
            Command::Candidates(mut cmd) => cmd.run().await,
            Command::Show(mut cmd) => cmd.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run().await?;
    std::process::exit(code);
}
