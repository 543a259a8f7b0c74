// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! edgepkg - Component lifecycle core for edge devices
//!
//! This crate decides which version of a component to run, makes sure its
//! recipe and artifacts are present on the device, and orders services so
//! that every dependency starts before its dependents.
//!
//! # Overview
//!
//! - [`VersionResolver`] lists candidate versions, preferring the version
//!   already running, then locally stored versions, then versions the
//!   catalog advertises.
//! - [`ComponentManager`] fetches recipes, downloads and unpacks artifacts,
//!   and prepares batches of components in the background.
//! - [`ServiceRegistry`] holds the live service graph, and
//!   [`ordered_dependencies`] computes its activation order.
//!
//! # Example
//!
//! ```yaml
//! # <root>/recipes/com.example.Hello/1.0.0.yaml
//! api: recipe/v0
//! name: com.example.Hello
//! version: 1.0.0
//! dependencies:
//!   com.example.Logger:
//!     version_requirement: ">=2.0.0"
//!     type: HARD
//! artifacts:
//!   - uri: s3://bucket/hello/hello.zip
//!     unarchive: ZIP
//! ```

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod graph;
pub mod ident;
pub mod manager;
pub mod recipe;
pub mod resolver;
pub mod service;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use catalog::{ComponentCatalog, DirectoryCatalog, OfflineCatalog};
pub use config::{Config, CONFIG_FILENAME};
pub use download::{ArtifactDownloader, DownloaderRegistry, FileDownloader, Unarchiver};
pub use error::{Error, ErrorKind, Result};
pub use graph::{ordered_dependencies, ActivationOrder};
pub use ident::{ComponentIdentifier, Scope, VersionRequirement, ANY_VERSION};
pub use manager::{ComponentManager, PreparationHandle};
pub use recipe::{ComponentArtifact, ComponentMetadata, Recipe, Unarchive};
pub use resolver::VersionResolver;
pub use service::{ServiceDefinition, ServiceNode, ServiceRegistry, State};
pub use store::{ComponentStore, FsComponentStore};
