// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `edgepkg prepare` command.

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use edgepkg::{ComponentIdentifier, ComponentManager, ServiceRegistry};
use miette::Result;

use crate::StoreFlags;

/// Exit code used when preparation is interrupted.
const INTERRUPTED: i32 = 130;

/// Fetch recipes and artifacts for components
#[derive(Debug, Args)]
pub struct CmdPrepare {
    #[clap(flatten)]
    store: StoreFlags,

    /// Components to prepare, as name@version
    #[clap(required = true)]
    components: Vec<ComponentIdentifier>,
}

impl CmdPrepare {
    pub async fn run(&mut self) -> Result<i32> {
        let config = self.store.load_config()?;
        let manager = ComponentManager::from_config(&config, Arc::new(ServiceRegistry::new()));

        let handle = manager.prepare(self.components.clone());
        let token = handle.cancellation_token();
        let interrupt = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping after the current component");
                interrupt.cancel();
            }
        });

        handle.wait().await?;

        if token.is_cancelled() {
            eprintln!("{}", "Preparation cancelled".yellow());
            return Ok(INTERRUPTED);
        }

        for id in &self.components {
            println!("{} {}", "✓".green(), id.to_string().bold());
        }
        println!();
        println!(
            "Prepared {} component(s) in {}",
            self.components.len(),
            config.root.display().to_string().cyan()
        );
        Ok(0)
    }
}
