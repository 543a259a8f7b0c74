// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Local component store: recipes and artifact directories on disk.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;

use crate::ident::{ComponentIdentifier, VersionRequirement};
use crate::recipe::{ComponentMetadata, Recipe};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./store_test.rs"]
mod store_test;

const RECIPE_DIRECTORY: &str = "recipes";
const ARTIFACT_DIRECTORY: &str = "artifacts";
const ARTIFACTS_UNARCHIVED_DIRECTORY: &str = "artifacts-unarchived";
const RECIPE_EXTENSION: &str = "yaml";

/// Storage for recipes and artifacts, keyed by component identifier.
///
/// All operations are local; failures are I/O or parse errors, never
/// network errors.
#[async_trait]
pub trait ComponentStore: Send + Sync {
    /// Load the recipe stored for `id`.
    ///
    /// `Ok(None)` means nothing is stored; an error means something is
    /// stored but cannot be used.
    async fn find_recipe(&self, id: &ComponentIdentifier) -> Result<Option<Recipe>>;

    /// Persist recipe text verbatim under `id`.
    async fn save_recipe(&self, id: &ComponentIdentifier, text: &str) -> Result<()>;

    /// List stored versions of `name` that satisfy `requirement`.
    async fn list_available(
        &self,
        name: &str,
        requirement: &VersionRequirement,
    ) -> Result<Vec<ComponentMetadata>>;

    /// Directory holding the downloaded artifacts of `id`.
    fn artifact_dir(&self, id: &ComponentIdentifier) -> PathBuf;

    /// Directory holding unpacked artifacts of `id`, created if absent.
    async fn unpack_dir(&self, id: &ComponentIdentifier) -> Result<PathBuf>;

    /// Load the recipe stored for `id`, failing when there is none.
    async fn get_recipe(&self, id: &ComponentIdentifier) -> Result<Recipe> {
        self.find_recipe(id)
            .await?
            .ok_or_else(|| Error::RecipeNotFound(id.clone()))
    }

    async fn get_metadata(&self, id: &ComponentIdentifier) -> Result<ComponentMetadata> {
        Ok(self.get_recipe(id).await?.metadata())
    }
}

/// A [`ComponentStore`] rooted in a local directory.
///
/// ```text
/// <root>/recipes/<name>/<version>.yaml
/// <root>/artifacts/<name>/<version>/
/// <root>/artifacts-unarchived/<name>/<version>/
/// ```
#[derive(Debug, Clone)]
pub struct FsComponentStore {
    root: PathBuf,
}

impl FsComponentStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn recipe_path(&self, id: &ComponentIdentifier) -> PathBuf {
        self.root
            .join(RECIPE_DIRECTORY)
            .join(&id.name)
            .join(format!("{}.{RECIPE_EXTENSION}", id.version))
    }

    fn component_dir(&self, base: &str, id: &ComponentIdentifier) -> PathBuf {
        self.root
            .join(base)
            .join(&id.name)
            .join(id.version.to_string())
    }

    /// Versions with a recipe file for `name`, in no particular order.
    async fn stored_versions(&self, name: &str) -> Result<Vec<Version>> {
        let dir = self.root.join(RECIPE_DIRECTORY).join(name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(Error::ReadFailed { path: dir, error }),
        };

        let mut versions = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => return Err(Error::ReadFailed { path: dir, error }),
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECIPE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match Version::parse(stem) {
                Ok(version) => versions.push(version),
                Err(_) => {
                    tracing::debug!(path = %path.display(), "ignoring recipe file without a version name");
                }
            }
        }
        Ok(versions)
    }
}

#[async_trait]
impl ComponentStore for FsComponentStore {
    async fn find_recipe(&self, id: &ComponentIdentifier) -> Result<Option<Recipe>> {
        let path = self.recipe_path(id);
        let yaml = match tokio::fs::read_to_string(&path).await {
            Ok(yaml) => yaml,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(Error::ReadFailed { path, error }),
        };
        Recipe::load(id, &yaml).map(Some)
    }

    async fn save_recipe(&self, id: &ComponentIdentifier, text: &str) -> Result<()> {
        let path = self.recipe_path(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| Error::WriteFailed {
                    path: parent.to_path_buf(),
                    error,
                })?;
        }
        tokio::fs::write(&path, text)
            .await
            .map_err(|error| Error::WriteFailed { path, error })
    }

    async fn list_available(
        &self,
        name: &str,
        requirement: &VersionRequirement,
    ) -> Result<Vec<ComponentMetadata>> {
        let mut versions: Vec<Version> = self
            .stored_versions(name)
            .await?
            .into_iter()
            .filter(|v| requirement.satisfied_by(v))
            .collect();
        // Newest first
        versions.sort_by(|a, b| b.cmp(a));

        let mut available = Vec::with_capacity(versions.len());
        for version in versions {
            let id = ComponentIdentifier::new(name, version);
            match self.get_metadata(&id).await {
                Ok(metadata) => available.push(metadata),
                Err(err) => {
                    tracing::warn!(component = %id, %err, "skipping unreadable stored recipe");
                }
            }
        }
        Ok(available)
    }

    fn artifact_dir(&self, id: &ComponentIdentifier) -> PathBuf {
        self.component_dir(ARTIFACT_DIRECTORY, id)
    }

    async fn unpack_dir(&self, id: &ComponentIdentifier) -> Result<PathBuf> {
        let path = self.component_dir(ARTIFACTS_UNARCHIVED_DIRECTORY, id);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|error| Error::WriteFailed {
                path: path.clone(),
                error,
            })?;
        Ok(path)
    }
}
