// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Recipe materialization, artifact acquisition and batch preparation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest as ShaDigest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::{ComponentCatalog, DirectoryCatalog, OfflineCatalog};
use crate::config::{Config, DEFAULT_MAX_CONCURRENT_PREPARATIONS};
use crate::download::{DownloaderRegistry, FileDownloader, Unarchiver, FILE_SCHEME};
use crate::ident::{ComponentIdentifier, VersionRequirement};
use crate::recipe::{
    ComponentArtifact,
    ComponentMetadata,
    Recipe,
    Unarchive,
    DEFAULT_DIGEST_ALGORITHM,
};
use crate::resolver::VersionResolver;
use crate::service::ServiceRegistry;
use crate::store::{ComponentStore, FsComponentStore};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./manager_test.rs"]
mod manager_test;

/// Directory inside an artifact directory holding incomplete downloads.
const STAGING_DIRECTORY: &str = ".partial";
/// Suffix of the directory an archive is extracted into before it is
/// moved into place.
const STAGING_SUFFIX: &str = ".partial";

/// Prepares components on the local device: fetches recipes, downloads
/// and unpacks artifacts, and lists candidate versions.
///
/// Cloning is cheap; clones share collaborators and the preparation pool.
#[derive(Clone)]
pub struct ComponentManager {
    store: Arc<dyn ComponentStore>,
    catalog: Arc<dyn ComponentCatalog>,
    downloaders: DownloaderRegistry,
    unarchiver: Option<Arc<dyn Unarchiver>>,
    resolver: VersionResolver,
    workers: Arc<Semaphore>,
}

impl std::fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentManager")
            .field("downloaders", &self.downloaders)
            .field("unarchiver", &self.unarchiver.is_some())
            .field("available_workers", &self.workers.available_permits())
            .finish_non_exhaustive()
    }
}

impl ComponentManager {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        store: Arc<dyn ComponentStore>,
        catalog: Arc<dyn ComponentCatalog>,
        downloaders: DownloaderRegistry,
    ) -> Self {
        let resolver = VersionResolver::new(registry, Arc::clone(&store), Arc::clone(&catalog));
        Self {
            store,
            catalog,
            downloaders,
            unarchiver: None,
            resolver,
            workers: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_PREPARATIONS)),
        }
    }

    /// Build a manager over a filesystem store, copying `file://`
    /// artifacts and using the configured mirror (if any) as catalog.
    pub fn from_config(config: &Config, registry: Arc<ServiceRegistry>) -> Self {
        let store = Arc::new(FsComponentStore::new(&config.root));
        let catalog: Arc<dyn ComponentCatalog> = match &config.mirror {
            Some(mirror) => Arc::new(DirectoryCatalog::new(mirror)),
            None => Arc::new(OfflineCatalog),
        };
        let downloaders =
            DownloaderRegistry::new().with_downloader(FILE_SCHEME, Arc::new(FileDownloader));
        Self::new(registry, store, catalog, downloaders)
            .with_max_concurrent_preparations(config.worker_count())
    }

    /// Extractor for artifacts declaring an unarchive mode.
    pub fn with_unarchiver(mut self, unarchiver: Arc<dyn Unarchiver>) -> Self {
        self.unarchiver = Some(unarchiver);
        self
    }

    /// Bound the number of batches prepared at once.
    pub fn with_max_concurrent_preparations(mut self, count: usize) -> Self {
        self.workers = Arc::new(Semaphore::new(count.max(1)));
        self
    }

    pub fn store(&self) -> &Arc<dyn ComponentStore> {
        &self.store
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    /// See [`VersionResolver::list_candidates`].
    pub async fn list_candidates(
        &self,
        name: &str,
        requirement: &VersionRequirement,
    ) -> Result<Vec<ComponentMetadata>> {
        self.resolver.list_candidates(name, requirement).await
    }

    /// Make sure a usable recipe for `id` is stored locally and return it.
    ///
    /// A stored recipe is returned as is; otherwise the recipe text is
    /// fetched from the catalog, stored verbatim and loaded back.
    pub async fn ensure_recipe(&self, id: &ComponentIdentifier) -> Result<Recipe> {
        match self.store.find_recipe(id).await {
            Ok(Some(recipe)) => {
                tracing::debug!(component = %id, "recipe already stored locally");
                return Ok(recipe);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(component = %id, %err, "failed to load stored recipe, fetching it again");
            }
        }

        let text = self.catalog.fetch_recipe_text(id).await?;
        self.store.save_recipe(id, &text).await?;
        self.store.get_recipe(id).await
    }

    /// Download and unpack every artifact of `id` that is not already
    /// in place.
    ///
    /// `None` means the recipe declares no artifact list; that is
    /// reported and skipped without touching the filesystem. Stops at
    /// the first failing artifact, leaving earlier ones in place. A file
    /// only lands in the artifact directory once fully downloaded and
    /// verified, and an unpack directory only once fully extracted, so a
    /// failed call can simply be repeated.
    pub async fn ensure_artifacts(
        &self,
        id: &ComponentIdentifier,
        artifacts: Option<&[ComponentArtifact]>,
    ) -> Result<()> {
        let Some(artifacts) = artifacts else {
            tracing::warn!(component = %id, "recipe declares no artifact list, skipping download");
            return Ok(());
        };

        let dest_dir = self.store.artifact_dir(id);
        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|error| Error::CreateArtifactDir {
                path: dest_dir.clone(),
                error,
            })?;

        for artifact in artifacts {
            self.ensure_artifact(id, artifact, &dest_dir).await?;
        }
        Ok(())
    }

    async fn ensure_artifact(
        &self,
        id: &ComponentIdentifier,
        artifact: &ComponentArtifact,
        dest_dir: &Path,
    ) -> Result<()> {
        let unarchiver = match artifact.unarchive {
            Unarchive::None => None,
            mode => Some(self.unarchiver.as_ref().ok_or_else(|| Error::NoUnarchiver {
                artifact: artifact.to_string(),
                mode: mode.to_string(),
            })?),
        };

        let (file, fresh) = if needs_download(artifact, dest_dir).await {
            match self.download(id, artifact, dest_dir).await? {
                Some(file) => (file, true),
                None => return Ok(()),
            }
        } else {
            tracing::debug!(component = %id, %artifact, "artifact already cached");
            match artifact.file_name() {
                Some(name) => (dest_dir.join(name), false),
                None => return Ok(()),
            }
        };

        match unarchiver {
            Some(unarchiver) => self.unpack(id, artifact, unarchiver, &file, fresh).await,
            None => Ok(()),
        }
    }

    /// Download into a staging directory and move the file into
    /// `dest_dir` once it is complete and matches its digest.
    async fn download(
        &self,
        id: &ComponentIdentifier,
        artifact: &ComponentArtifact,
        dest_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let downloader = self.downloaders.select(artifact)?;
        let staging = dest_dir.join(STAGING_DIRECTORY);
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|error| Error::CreateArtifactDir {
                path: staging.clone(),
                error,
            })?;
        let leftover = artifact.file_name().map(|name| staging.join(name));
        if let Some(leftover) = &leftover {
            discard_file(leftover).await;
        }

        tracing::debug!(component = %id, %artifact, scheme = %artifact.scheme(), "downloading artifact");
        let staged = match downloader.download(id, artifact, &staging).await {
            Ok(Some(staged)) => staged,
            Ok(None) => return Ok(None),
            Err(error) => {
                if let Some(leftover) = &leftover {
                    discard_file(leftover).await;
                }
                return Err(Error::ArtifactDownload {
                    id: id.clone(),
                    artifact: artifact.to_string(),
                    error,
                });
            }
        };

        if let Some(expected) = &artifact.digest {
            if let Err(err) = verify_digest(id, artifact, expected, &staged).await {
                discard_file(&staged).await;
                return Err(err);
            }
        }

        let Some(file_name) = staged.file_name() else {
            return Err(Error::ArtifactDownload {
                id: id.clone(),
                artifact: artifact.to_string(),
                error: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("downloader produced {} without a file name", staged.display()),
                ),
            });
        };
        let file = dest_dir.join(file_name);
        tokio::fs::rename(&staged, &file)
            .await
            .map_err(|error| Error::WriteFailed {
                path: file.clone(),
                error,
            })?;
        Ok(Some(file))
    }

    /// Extract `file` into `<unpack dir>/<file stem>`.
    ///
    /// Skipped when the target already exists and `file` was not just
    /// downloaded. Extraction happens in a sibling staging directory
    /// that replaces the target only on success.
    async fn unpack(
        &self,
        id: &ComponentIdentifier,
        artifact: &ComponentArtifact,
        unarchiver: &Arc<dyn Unarchiver>,
        file: &Path,
        fresh: bool,
    ) -> Result<()> {
        let unarchive_error = |error: std::io::Error| Error::Unarchive {
            id: id.clone(),
            artifact: artifact.to_string(),
            error,
        };
        let Some(stem) = file.file_stem() else {
            return Err(unarchive_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", file.display()),
            )));
        };

        let unpack_root = self.store.unpack_dir(id).await?;
        let target = unpack_root.join(stem);
        if !fresh && tokio::fs::try_exists(&target).await.unwrap_or(false) {
            tracing::debug!(component = %id, %artifact, "artifact already unarchived");
            return Ok(());
        }

        let mut staging_name = OsString::from(".");
        staging_name.push(stem);
        staging_name.push(STAGING_SUFFIX);
        let staging = unpack_root.join(staging_name);
        discard_dir(&staging).await;
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|error| Error::WriteFailed {
                path: staging.clone(),
                error,
            })?;

        tracing::debug!(component = %id, %artifact, dest = %target.display(), "unarchiving artifact");
        if let Err(error) = unarchiver
            .unarchive(artifact.unarchive, file, &staging)
            .await
        {
            discard_dir(&staging).await;
            return Err(unarchive_error(error));
        }

        discard_dir(&target).await;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|error| Error::WriteFailed {
                path: target.clone(),
                error,
            })
    }

    /// Prepare `ids` in order on a background task.
    ///
    /// Each identifier gets its recipe and then its artifacts. The first
    /// failure ends the batch and becomes the result of
    /// [`PreparationHandle::wait`]. Must be called within a tokio runtime.
    pub fn prepare(&self, ids: Vec<ComponentIdentifier>) -> PreparationHandle {
        let cancel = CancellationToken::new();
        let manager = self.clone();
        let token = cancel.clone();
        let join = tokio::spawn(async move { manager.prepare_batch(ids, token).await });
        PreparationHandle { join, cancel }
    }

    async fn prepare_batch(
        &self,
        ids: Vec<ComponentIdentifier>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|err| Error::PreparationAborted(err.to_string()))?;

        tracing::info!(count = ids.len(), "prepare packages start");
        for id in &ids {
            if cancel.is_cancelled() {
                tracing::info!(component = %id, "preparation cancelled");
                return Ok(());
            }
            if let Err(err) = self.prepare_one(id).await {
                tracing::error!(component = %id, %err, "failed to prepare package");
                return Err(err);
            }
        }
        tracing::info!(count = ids.len(), "prepare packages finish");
        Ok(())
    }

    async fn prepare_one(&self, id: &ComponentIdentifier) -> Result<()> {
        let recipe = self.ensure_recipe(id).await?;
        self.ensure_artifacts(id, recipe.artifacts.as_deref()).await
    }
}

/// Remove a leftover file, if any.
async fn discard_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "failed to remove partial download");
        }
    }
}

/// Remove a leftover directory tree, if any.
async fn discard_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "failed to remove stale unpack directory");
        }
    }
}

/// Whether `artifact` is missing from `dest_dir` or fails its digest.
async fn needs_download(artifact: &ComponentArtifact, dest_dir: &Path) -> bool {
    let Some(file_name) = artifact.file_name() else {
        return true;
    };
    let path = dest_dir.join(file_name);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return true;
    }
    let Some(expected) = &artifact.digest else {
        return false;
    };
    if !is_supported_algorithm(artifact) {
        return false;
    }
    match file_digest(&path).await {
        Ok(actual) => !actual.eq_ignore_ascii_case(expected),
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "failed to hash cached artifact");
            true
        }
    }
}

async fn verify_digest(
    id: &ComponentIdentifier,
    artifact: &ComponentArtifact,
    expected: &str,
    file: &Path,
) -> Result<()> {
    if !is_supported_algorithm(artifact) {
        tracing::warn!(
            component = %id,
            %artifact,
            algorithm = artifact.digest_algorithm(),
            "unsupported digest algorithm, skipping verification"
        );
        return Ok(());
    }
    let actual = file_digest(file)
        .await
        .map_err(|error| Error::ArtifactDownload {
            id: id.clone(),
            artifact: artifact.to_string(),
            error,
        })?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::MismatchedDigest {
            id: id.clone(),
            artifact: artifact.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

fn is_supported_algorithm(artifact: &ComponentArtifact) -> bool {
    artifact
        .digest_algorithm()
        .eq_ignore_ascii_case(DEFAULT_DIGEST_ALGORITHM)
}

async fn file_digest(path: &Path) -> std::io::Result<String> {
    let content = tokio::fs::read(path).await?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

/// Handle to a batch started by [`ComponentManager::prepare`].
#[derive(Debug)]
pub struct PreparationHandle {
    join: JoinHandle<Result<()>>,
    cancel: CancellationToken,
}

impl PreparationHandle {
    /// Stop before the next identifier. Work already in progress for the
    /// current identifier completes and is not rolled back.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this batch, for use from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the batch to finish.
    pub async fn wait(self) -> Result<()> {
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(Error::PreparationAborted(err.to_string())),
        }
    }
}
