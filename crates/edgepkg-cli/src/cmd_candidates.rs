// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `edgepkg candidates` command.

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use edgepkg::{ComponentManager, ComponentMetadata, ServiceRegistry, VersionRequirement};
use miette::{IntoDiagnostic, Result};
use serde_yaml::{Mapping, Value};

use crate::StoreFlags;

#[cfg(test)]
#[path = "./cmd_candidates_test.rs"]
mod cmd_candidates_test;

/// List candidate versions of a component
#[derive(Debug, Args)]
pub struct CmdCandidates {
    #[clap(flatten)]
    store: StoreFlags,

    /// Component name
    name: String,

    /// Version requirement, e.g. ">=1.0.0, <2.0.0"
    #[clap(default_value = edgepkg::ANY_VERSION)]
    requirement: VersionRequirement,

    /// Output format: table, yaml
    #[clap(long, default_value = "table")]
    format: String,
}

impl CmdCandidates {
    pub async fn run(&mut self) -> Result<i32> {
        let config = self.store.load_config()?;
        let manager = ComponentManager::from_config(&config, Arc::new(ServiceRegistry::new()));
        let candidates = manager
            .list_candidates(&self.name, &self.requirement)
            .await?;

        if self.format == "yaml" {
            let yaml = candidates_yaml(&self.name, &self.requirement, &candidates)
                .into_diagnostic()?;
            print!("{yaml}");
        } else {
            self.show_table(&candidates);
        }

        Ok(if candidates.is_empty() { 1 } else { 0 })
    }

    fn show_table(&self, candidates: &[ComponentMetadata]) {
        println!(
            "{} {} {}",
            "Candidates for".bold(),
            self.name.cyan(),
            self.requirement.to_string().yellow()
        );
        println!();

        if candidates.is_empty() {
            println!("  {}", "(no candidates)".dimmed());
        }
        for (i, candidate) in candidates.iter().enumerate() {
            println!(
                "  {}. {} {}",
                i + 1,
                candidate.identifier.version.to_string().green(),
                format!("[{}]", candidate.identifier.scope).dimmed()
            );
            for (dep, requirement) in &candidate.dependencies {
                println!("       {} {}", dep.cyan(), requirement);
            }
        }

        println!();
        println!("Total: {} candidate(s)", candidates.len());
    }
}

/// Candidates as a YAML document; keys and values are quoted as needed.
pub fn candidates_yaml(
    name: &str,
    requirement: &VersionRequirement,
    candidates: &[ComponentMetadata],
) -> serde_yaml::Result<String> {
    let entries = candidates
        .iter()
        .map(|candidate| {
            let mut entry = Mapping::new();
            entry.insert(
                "version".into(),
                candidate.identifier.version.to_string().into(),
            );
            entry.insert("scope".into(), candidate.identifier.scope.to_string().into());
            if !candidate.dependencies.is_empty() {
                let dependencies: Mapping = candidate
                    .dependencies
                    .iter()
                    .map(|(dep, req)| (Value::from(dep.as_str()), Value::from(req.to_string())))
                    .collect();
                entry.insert("dependencies".into(), Value::Mapping(dependencies));
            }
            Value::Mapping(entry)
        })
        .collect();

    let mut doc = Mapping::new();
    doc.insert("name".into(), name.into());
    doc.insert("requirement".into(), requirement.to_string().into());
    doc.insert("candidates".into(), Value::Sequence(entries));
    serde_yaml::to_string(&doc)
}
