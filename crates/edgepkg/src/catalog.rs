// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Remote catalog of component versions and recipes.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::ident::{ComponentIdentifier, VersionRequirement};
use crate::recipe::ComponentMetadata;
use crate::store::{ComponentStore, FsComponentStore};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./catalog_test.rs"]
mod catalog_test;

/// Remote source of component versions and recipe documents.
///
/// Implementations are network backed; callers decide whether a failure
/// is fatal (recipe fetch) or degradable (version listing).
#[async_trait]
pub trait ComponentCatalog: Send + Sync {
    /// Versions of `name` the catalog advertises that satisfy `requirement`.
    async fn list_available(
        &self,
        name: &str,
        requirement: &VersionRequirement,
    ) -> Result<Vec<ComponentMetadata>>;

    /// Raw recipe text for `id`.
    async fn fetch_recipe_text(&self, id: &ComponentIdentifier) -> Result<String>;
}

/// Catalog served from a mirror directory laid out like a
/// [`FsComponentStore`], for devices without access to a catalog service.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    mirror: FsComponentStore,
}

impl DirectoryCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            mirror: FsComponentStore::new(root),
        }
    }
}

#[async_trait]
impl ComponentCatalog for DirectoryCatalog {
    async fn list_available(
        &self,
        name: &str,
        requirement: &VersionRequirement,
    ) -> Result<Vec<ComponentMetadata>> {
        self.mirror
            .list_available(name, requirement)
            .await
            .map_err(|err| Error::Catalog {
                message: format!("failed to list versions of {name} in mirror"),
                source: Some(Box::new(err)),
            })
    }

    async fn fetch_recipe_text(&self, id: &ComponentIdentifier) -> Result<String> {
        let path = self.mirror.recipe_path(id);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|error| Error::Catalog {
                message: format!("no recipe for {id} in mirror"),
                source: Some(Box::new(Error::ReadFailed { path, error })),
            })
    }
}

/// Catalog used when no mirror or catalog service is configured.
///
/// Advertises nothing and fails every recipe fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCatalog;

#[async_trait]
impl ComponentCatalog for OfflineCatalog {
    async fn list_available(
        &self,
        _name: &str,
        _requirement: &VersionRequirement,
    ) -> Result<Vec<ComponentMetadata>> {
        Ok(Vec::new())
    }

    async fn fetch_recipe_text(&self, id: &ComponentIdentifier) -> Result<String> {
        Err(Error::catalog(format!(
            "no catalog configured to fetch the recipe for {id}"
        )))
    }
}
