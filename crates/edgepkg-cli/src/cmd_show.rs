// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `edgepkg show` command.

use clap::Args;
use colored::Colorize;
use edgepkg::{ComponentIdentifier, ComponentStore, FsComponentStore, Recipe, Unarchive};
use miette::{IntoDiagnostic, Result};

use crate::StoreFlags;

/// Display a stored recipe
#[derive(Debug, Args)]
pub struct CmdShow {
    #[clap(flatten)]
    store: StoreFlags,

    /// Component to show, as name@version
    component: ComponentIdentifier,

    /// Output format: table, yaml
    #[clap(long, default_value = "table")]
    format: String,
}

impl CmdShow {
    pub async fn run(&mut self) -> Result<i32> {
        let config = self.store.load_config()?;
        let store = FsComponentStore::new(&config.root);
        let recipe = store.get_recipe(&self.component).await?;

        if self.format == "yaml" {
            print!("{}", serde_yaml::to_string(&recipe).into_diagnostic()?);
        } else {
            self.show_table(&store, &recipe);
        }
        Ok(0)
    }

    fn show_table(&self, store: &FsComponentStore, recipe: &Recipe) {
        println!("{}", recipe.identifier().to_string().bold());
        if let Some(desc) = &recipe.description {
            println!("  {}", desc.dimmed());
        }
        println!("  scope:  {}", recipe.scope);
        println!(
            "  recipe: {}",
            store.recipe_path(&self.component).display().to_string().cyan()
        );
        println!();

        println!("{}", "Dependencies:".bold());
        if recipe.dependencies.is_empty() {
            println!("  {}", "(no dependencies)".dimmed());
        }
        for (name, props) in &recipe.dependencies {
            println!(
                "  {} {} {}",
                name.cyan(),
                props.version_requirement.to_string().green(),
                format!("[{:?}]", props.dependency_type).to_uppercase().dimmed()
            );
        }
        println!();

        println!("{}", "Artifacts:".bold());
        match &recipe.artifacts {
            None => println!("  {}", "(no artifact list)".dimmed()),
            Some(artifacts) if artifacts.is_empty() => {
                println!("  {}", "(no artifacts)".dimmed())
            }
            Some(artifacts) => {
                let dir = store.artifact_dir(&self.component);
                for (i, artifact) in artifacts.iter().enumerate() {
                    let cached = artifact
                        .file_name()
                        .is_some_and(|name| dir.join(name).is_file());
                    let marker = if cached {
                        "cached".green()
                    } else {
                        "missing".yellow()
                    };
                    let unarchive = match artifact.unarchive {
                        Unarchive::None => String::new(),
                        mode => format!(" [unarchive: {mode}]"),
                    };
                    println!(
                        "  {}. {}{} ({})",
                        i + 1,
                        artifact.uri.as_str().cyan(),
                        unarchive.blue(),
                        marker
                    );
                }
            }
        }
    }
}
