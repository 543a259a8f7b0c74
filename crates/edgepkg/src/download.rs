// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Artifact downloaders, selected by URI scheme, and archive extraction.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::ident::ComponentIdentifier;
use crate::recipe::{ComponentArtifact, Unarchive};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./download_test.rs"]
mod download_test;

/// Scheme of the proprietary component repository.
pub const GREENGRASS_SCHEME: &str = "GREENGRASS";
/// Scheme of the object store.
pub const S3_SCHEME: &str = "S3";
/// Scheme of local files.
pub const FILE_SCHEME: &str = "FILE";

/// Places one artifact into a component's artifact directory.
#[async_trait]
pub trait ArtifactDownloader: Send + Sync {
    /// Download `artifact` into `dest_dir`, returning the file produced,
    /// if any.
    async fn download(
        &self,
        id: &ComponentIdentifier,
        artifact: &ComponentArtifact,
        dest_dir: &Path,
    ) -> io::Result<Option<PathBuf>>;
}

/// Unpacks a downloaded archive.
#[async_trait]
pub trait Unarchiver: Send + Sync {
    async fn unarchive(&self, mode: Unarchive, file: &Path, dest_dir: &Path) -> io::Result<()>;
}

/// Dispatches downloads by upper-cased URI scheme.
#[derive(Clone, Default)]
pub struct DownloaderRegistry {
    downloaders: IndexMap<String, Arc<dyn ArtifactDownloader>>,
}

impl fmt::Debug for DownloaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloaderRegistry")
            .field("schemes", &self.schemes())
            .finish_non_exhaustive()
    }
}

impl DownloaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `downloader` for `scheme`, replacing any previous one.
    pub fn with_downloader<S: AsRef<str>>(
        mut self,
        scheme: S,
        downloader: Arc<dyn ArtifactDownloader>,
    ) -> Self {
        self.downloaders
            .insert(scheme.as_ref().to_uppercase(), downloader);
        self
    }

    pub fn schemes(&self) -> Vec<String> {
        self.downloaders.keys().cloned().collect()
    }

    /// Select the downloader for an artifact's URI scheme.
    pub fn select(&self, artifact: &ComponentArtifact) -> Result<Arc<dyn ArtifactDownloader>> {
        let scheme = artifact.scheme();
        match self.downloaders.get(&scheme) {
            Some(downloader) => Ok(Arc::clone(downloader)),
            None => Err(Error::UnsupportedScheme {
                scheme,
                supported: self.schemes(),
            }),
        }
    }
}

/// Copies `file://` artifacts from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDownloader;

#[async_trait]
impl ArtifactDownloader for FileDownloader {
    async fn download(
        &self,
        id: &ComponentIdentifier,
        artifact: &ComponentArtifact,
        dest_dir: &Path,
    ) -> io::Result<Option<PathBuf>> {
        let source = artifact.uri.to_file_path().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a local file path", artifact.uri),
            )
        })?;
        let Some(file_name) = source.file_name() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} does not name a file", artifact.uri),
            ));
        };
        let dest = dest_dir.join(file_name);
        tracing::debug!(component = %id, source = %source.display(), "copying local artifact");
        tokio::fs::copy(&source, &dest).await?;
        Ok(Some(dest))
    }
}
