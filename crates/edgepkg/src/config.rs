// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the component store and preparation pool.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Default name of the configuration file.
pub const CONFIG_FILENAME: &str = "edgepkg.yaml";

/// Directory under the home directory used when no root is configured.
pub const DEFAULT_ROOT_DIRNAME: &str = ".edgepkg";

pub const DEFAULT_MAX_CONCURRENT_PREPARATIONS: usize = 4;

/// API version for configuration documents.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ConfigApiVersion {
    #[default]
    #[serde(rename = "edgepkg/v0")]
    V0,
}

#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: ConfigApiVersion,
}

/// Settings shared by the library and the CLI.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub api: ConfigApiVersion,

    /// Root of the local component store.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Number of preparation batches allowed to run at once.
    #[serde(default = "default_max_concurrent_preparations")]
    pub max_concurrent_preparations: usize,

    /// Directory laid out like a component store, used as the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<PathBuf>,
}

fn default_root() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(DEFAULT_ROOT_DIRNAME),
        None => PathBuf::from(DEFAULT_ROOT_DIRNAME),
    }
}

fn default_max_concurrent_preparations() -> usize {
    DEFAULT_MAX_CONCURRENT_PREPARATIONS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ConfigApiVersion::V0,
            root: default_root(),
            max_concurrent_preparations: DEFAULT_MAX_CONCURRENT_PREPARATIONS,
            mirror: None,
        }
    }
}

impl Config {
    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> serde_yaml::Result<Self> {
        // Stage 1: Parse to get API version
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let with_version: ApiVersionMapping = serde_yaml::from_value(value.clone())?;

        // Stage 2: Deserialize based on version
        match with_version.api {
            ConfigApiVersion::V0 => serde_yaml::from_value(value),
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        })?;
        let mut config = Self::from_yaml(&yaml).map_err(|error| Error::InvalidConfig { error })?;
        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Make relative paths relative to `base` (the config file directory).
    fn resolve_relative_paths(&mut self, base: &Path) {
        if self.root.is_relative() {
            self.root = base.join(&self.root);
        }
        if let Some(mirror) = self.mirror.as_mut() {
            if mirror.is_relative() {
                *mirror = base.join(&*mirror);
            }
        }
    }

    /// Semaphore size for the preparation pool; never zero.
    pub fn worker_count(&self) -> usize {
        self.max_concurrent_preparations.max(1)
    }
}
