// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators shared by the unit tests.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::catalog::ComponentCatalog;
use crate::download::{ArtifactDownloader, Unarchiver};
use crate::ident::{ComponentIdentifier, VersionRequirement};
use crate::recipe::{ComponentArtifact, ComponentMetadata, Recipe, Unarchive};
use crate::{Error, Result};

pub fn id(name: &str, version: &str) -> ComponentIdentifier {
    ComponentIdentifier::new(name, semver::Version::parse(version).unwrap())
}

pub fn artifact(uri: &str) -> ComponentArtifact {
    ComponentArtifact::new(Url::parse(uri).unwrap())
}

pub fn recipe_yaml(name: &str, version: &str) -> String {
    format!("api: recipe/v0\nname: {name}\nversion: {version}\n")
}

/// Recipe YAML declaring the given artifact URIs.
pub fn recipe_yaml_with_artifacts(name: &str, version: &str, uris: &[&str]) -> String {
    let mut yaml = recipe_yaml(name, version);
    yaml.push_str("artifacts:\n");
    for uri in uris {
        yaml.push_str(&format!("  - uri: \"{uri}\"\n"));
    }
    yaml
}

/// Catalog holding recipe text in memory.
#[derive(Default)]
pub struct FakeCatalog {
    recipes: Mutex<BTreeMap<ComponentIdentifier, String>>,
    fail_listing: AtomicBool,
    fetches: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_recipe(self, id: &ComponentIdentifier, text: String) -> Self {
        self.recipes.lock().unwrap().insert(id.clone(), text);
        self
    }

    pub fn with_versions(self, name: &str, versions: &[&str]) -> Self {
        versions.iter().fold(self, |catalog, version| {
            catalog.with_recipe(&id(name, version), recipe_yaml(name, version))
        })
    }

    pub fn failing_listing(self) -> Self {
        self.fail_listing.store(true, Ordering::SeqCst);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComponentCatalog for FakeCatalog {
    async fn list_available(
        &self,
        name: &str,
        requirement: &VersionRequirement,
    ) -> Result<Vec<ComponentMetadata>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::catalog("catalog unreachable"));
        }
        let recipes = self.recipes.lock().unwrap();
        Ok(recipes
            .iter()
            .filter(|(id, _)| id.name == name && requirement.satisfied_by(&id.version))
            .filter_map(|(_, text)| Recipe::from_yaml(text).ok())
            .map(|recipe| recipe.metadata())
            .collect())
    }

    async fn fetch_recipe_text(&self, id: &ComponentIdentifier) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.recipes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::catalog(format!("no recipe for {id}")))
    }
}

/// Downloader that writes the artifact URI as the file content.
#[derive(Default)]
pub struct RecordingDownloader {
    downloaded: Mutex<Vec<String>>,
    failures: AtomicUsize,
}

impl RecordingDownloader {
    /// Fails every download after writing part of the file.
    pub fn failing() -> Self {
        Self::failing_times(usize::MAX)
    }

    /// Fails the first download only.
    pub fn failing_once() -> Self {
        Self::failing_times(1)
    }

    fn failing_times(count: usize) -> Self {
        let downloader = Self::default();
        downloader.failures.store(count, Ordering::SeqCst);
        downloader
    }

    pub fn downloaded(&self) -> Vec<String> {
        self.downloaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactDownloader for RecordingDownloader {
    async fn download(
        &self,
        _id: &ComponentIdentifier,
        artifact: &ComponentArtifact,
        dest_dir: &Path,
    ) -> io::Result<Option<PathBuf>> {
        self.downloaded.lock().unwrap().push(artifact.uri.to_string());
        let Some(file_name) = artifact.file_name() else {
            return Ok(None);
        };
        let dest = dest_dir.join(file_name);
        if take_failure(&self.failures) {
            tokio::fs::write(&dest, b"trunc").await?;
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        tokio::fs::write(&dest, artifact.uri.as_str()).await?;
        Ok(Some(dest))
    }
}

/// Unarchiver that records calls and drops a marker file.
#[derive(Default)]
pub struct RecordingUnarchiver {
    calls: Mutex<Vec<(Unarchive, PathBuf, PathBuf)>>,
    failures: AtomicUsize,
}

impl RecordingUnarchiver {
    /// Fails the first call after writing part of the output.
    pub fn failing_once() -> Self {
        let unarchiver = Self::default();
        unarchiver.failures.store(1, Ordering::SeqCst);
        unarchiver
    }

    pub fn calls(&self) -> Vec<(Unarchive, PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Unarchiver for RecordingUnarchiver {
    async fn unarchive(&self, mode: Unarchive, file: &Path, dest_dir: &Path) -> io::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((mode, file.to_path_buf(), dest_dir.to_path_buf()));
        if take_failure(&self.failures) {
            tokio::fs::write(dest_dir.join("partial"), b"").await?;
            return Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt archive"));
        }
        tokio::fs::write(dest_dir.join("unpacked"), b"ok").await
    }
}

/// Consume one of the remaining failures, if any.
fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
