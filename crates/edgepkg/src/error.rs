// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for edgepkg operations.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::ident::ComponentIdentifier;

#[cfg(test)]
#[path = "./error_test.rs"]
mod error_test;

/// Convenience Result type with edgepkg Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
///
/// Loading and download errors are fatal for the identifier being
/// prepared, packaging errors for the resolution that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local state is missing or corrupt, or a local step cannot complete.
    Loading,
    /// A required interaction with a remote source failed.
    Download,
    /// Version or metadata resolution produced no usable result.
    Packaging,
    /// A service could not be located or constructed.
    ServiceLoad,
}

/// Errors that can occur during edgepkg operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// No recipe stored for the identifier
    #[error("No recipe found for component {0}")]
    #[diagnostic(
        code(edgepkg::loading::recipe_not_found),
        help("Run 'edgepkg prepare' to fetch it from the catalog")
    )]
    RecipeNotFound(ComponentIdentifier),

    /// Stored recipe could not be parsed
    #[error("Invalid recipe for component {id}: {error}")]
    #[diagnostic(
        code(edgepkg::loading::invalid_recipe),
        help("Check YAML syntax and ensure 'api: recipe/v0' is present")
    )]
    InvalidRecipe {
        id: ComponentIdentifier,
        #[source]
        error: serde_yaml::Error,
    },

    /// Recipe content does not describe the identifier it is stored under
    #[error("Recipe stored for {expected} describes {actual}")]
    #[diagnostic(code(edgepkg::loading::recipe_mismatch))]
    RecipeMismatch {
        expected: ComponentIdentifier,
        actual: ComponentIdentifier,
    },

    /// Failed to read a file from the local store
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(edgepkg::loading::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to write a file into the local store
    #[error("Failed to write file: {path:?}")]
    #[diagnostic(code(edgepkg::loading::write_failed))]
    WriteFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Artifact cache directory could not be created
    #[error("Failed to create component artifact cache directory {path:?}")]
    #[diagnostic(code(edgepkg::loading::create_artifact_dir))]
    CreateArtifactDir {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// No downloader is registered for the artifact's URI scheme
    #[error("artifact URI scheme {scheme} is not supported yet")]
    #[diagnostic(
        code(edgepkg::loading::unsupported_scheme),
        help("Supported schemes: {}", supported.join(", "))
    )]
    UnsupportedScheme {
        scheme: String,
        supported: Vec<String>,
    },

    /// An artifact needs unpacking but no extractor was configured
    #[error("No unarchiver configured to unpack {artifact} ({mode})")]
    #[diagnostic(code(edgepkg::loading::no_unarchiver))]
    NoUnarchiver { artifact: String, mode: String },

    /// Artifact download failed
    #[error("Failed to download component {id} artifact {artifact}")]
    #[diagnostic(code(edgepkg::download::artifact))]
    ArtifactDownload {
        id: ComponentIdentifier,
        artifact: String,
        #[source]
        error: std::io::Error,
    },

    /// Artifact content does not match its declared digest
    #[error("Mismatched digest for component {id} artifact {artifact}")]
    #[diagnostic(code(edgepkg::download::mismatched_digest))]
    MismatchedDigest {
        id: ComponentIdentifier,
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Unpacking a downloaded artifact failed
    #[error("Failed to unarchive component {id} artifact {artifact}")]
    #[diagnostic(code(edgepkg::download::unarchive))]
    Unarchive {
        id: ComponentIdentifier,
        artifact: String,
        #[source]
        error: std::io::Error,
    },

    /// The remote catalog could not serve a request
    #[error("Catalog request failed: {message}")]
    #[diagnostic(code(edgepkg::download::catalog))]
    Catalog {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Metadata for the active version could not be resolved
    #[error("Failed to resolve metadata for active component {id}")]
    #[diagnostic(code(edgepkg::packaging::active_metadata))]
    ActiveMetadata {
        id: ComponentIdentifier,
        #[source]
        source: Box<Error>,
    },

    /// Version requirement expression could not be parsed
    #[error("Invalid version requirement '{requirement}': {error}")]
    #[diagnostic(code(edgepkg::packaging::invalid_requirement))]
    InvalidRequirement {
        requirement: String,
        #[source]
        error: semver::Error,
    },

    /// Component identifier string could not be parsed
    #[error("Invalid component identifier '{0}'")]
    #[diagnostic(
        code(edgepkg::packaging::invalid_identifier),
        help("Identifiers are written as name@version, e.g. com.example.Hello@1.0.0")
    )]
    InvalidIdentifier(String),

    /// Service is not declared in the system model
    #[error("No matching definition in system model for: {0}")]
    #[diagnostic(code(edgepkg::service::no_definition))]
    NoDefinition(String),

    /// Service definition names a type with no registered constructor
    #[error("No registered service type '{type_tag}' for service {name}")]
    #[diagnostic(
        code(edgepkg::service::unknown_type),
        help("Register a constructor with ServiceRegistry::register_type")
    )]
    UnknownServiceType { name: String, type_tag: String },

    /// Preparation task stopped without producing a result
    #[error("Preparation task aborted: {0}")]
    #[diagnostic(code(edgepkg::loading::preparation_aborted))]
    PreparationAborted(String),

    /// Invalid configuration document
    #[error("Invalid configuration file: {error}")]
    #[diagnostic(
        code(edgepkg::loading::invalid_config),
        help("Check YAML syntax and ensure 'api: edgepkg/v0' is present")
    )]
    InvalidConfig {
        #[source]
        error: serde_yaml::Error,
    },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(edgepkg::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RecipeNotFound(_)
            | Error::InvalidRecipe { .. }
            | Error::RecipeMismatch { .. }
            | Error::ReadFailed { .. }
            | Error::WriteFailed { .. }
            | Error::CreateArtifactDir { .. }
            | Error::UnsupportedScheme { .. }
            | Error::NoUnarchiver { .. }
            | Error::PreparationAborted(_)
            | Error::InvalidConfig { .. }
            | Error::Io(_) => ErrorKind::Loading,
            Error::ArtifactDownload { .. }
            | Error::MismatchedDigest { .. }
            | Error::Unarchive { .. }
            | Error::Catalog { .. } => ErrorKind::Download,
            Error::ActiveMetadata { .. }
            | Error::InvalidRequirement { .. }
            | Error::InvalidIdentifier(_) => ErrorKind::Packaging,
            Error::NoDefinition(_) | Error::UnknownServiceType { .. } => ErrorKind::ServiceLoad,
        }
    }

    /// Build a catalog error from a message alone.
    pub fn catalog<S: Into<String>>(message: S) -> Self {
        Error::Catalog {
            message: message.into(),
            source: None,
        }
    }
}
