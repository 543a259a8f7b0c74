// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Recipe documents and the metadata derived from them.

use std::fmt;

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ident::{ComponentIdentifier, Scope, VersionRequirement};
use crate::Error;

#[cfg(test)]
#[path = "./recipe_test.rs"]
mod recipe_test;

/// Digest algorithm assumed when an artifact declares a digest only.
pub const DEFAULT_DIGEST_ALGORITHM: &str = "SHA-256";

/// API version for recipe documents.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum RecipeApiVersion {
    #[default]
    #[serde(rename = "recipe/v0")]
    V0,
}

/// Helper for two-stage deserialization to determine API version first.
#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: RecipeApiVersion,
}

/// How a downloaded artifact is unpacked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Unarchive {
    #[default]
    None,
    Zip,
    Jar,
    Tar,
    Tgz,
}

impl fmt::Display for Unarchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Unarchive::None => "NONE",
            Unarchive::Zip => "ZIP",
            Unarchive::Jar => "JAR",
            Unarchive::Tar => "TAR",
            Unarchive::Tgz => "TGZ",
        };
        f.write_str(name)
    }
}

/// A file required by a component, fetched from `uri`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ComponentArtifact {
    pub uri: Url,

    #[serde(default)]
    pub unarchive: Unarchive,

    /// Expected content digest, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Digest algorithm, SHA-256 when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

impl ComponentArtifact {
    pub fn new(uri: Url) -> Self {
        Self {
            uri,
            unarchive: Unarchive::None,
            digest: None,
            algorithm: None,
        }
    }

    pub fn with_unarchive(mut self, unarchive: Unarchive) -> Self {
        self.unarchive = unarchive;
        self
    }

    pub fn with_digest<S: Into<String>>(mut self, digest: S) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Upper-cased URI scheme, used to select a downloader.
    pub fn scheme(&self) -> String {
        self.uri.scheme().to_uppercase()
    }

    /// Name of the file this artifact is cached under: the last
    /// non-empty segment of the URI path.
    pub fn file_name(&self) -> Option<&str> {
        self.uri
            .path()
            .rsplit('/')
            .find(|segment| !segment.is_empty())
    }

    pub fn digest_algorithm(&self) -> &str {
        self.algorithm
            .as_deref()
            .unwrap_or(DEFAULT_DIGEST_ALGORITHM)
    }
}

impl fmt::Display for ComponentArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.uri.fmt(f)
    }
}

/// Strength of a declared dependency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DependencyType {
    #[default]
    Hard,
    Soft,
}

/// Declared dependency on another component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DependencyProperties {
    #[serde(default)]
    pub version_requirement: VersionRequirement,

    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,
}

/// A component manifest as persisted in the store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Recipe {
    /// API version identifier.
    pub api: RecipeApiVersion,

    pub name: String,

    pub version: Version,

    #[serde(default)]
    pub scope: Scope,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Dependencies keyed by component name, in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, DependencyProperties>,

    /// Declared artifacts. Absent and empty are distinct: an absent list
    /// is reported but never fails preparation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<ComponentArtifact>>,
}

impl Recipe {
    /// Start a recipe for `id` with no dependencies and no artifact list.
    pub fn new(id: &ComponentIdentifier) -> Self {
        Self {
            api: RecipeApiVersion::V0,
            name: id.name.clone(),
            version: id.version.clone(),
            scope: id.scope,
            description: None,
            dependencies: IndexMap::new(),
            artifacts: None,
        }
    }

    /// Parse recipe from YAML string.
    pub fn from_yaml(yaml: &str) -> serde_yaml::Result<Self> {
        // Stage 1: Parse to get API version
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let with_version: ApiVersionMapping = serde_yaml::from_value(value.clone())?;

        // Stage 2: Deserialize based on version
        match with_version.api {
            RecipeApiVersion::V0 => serde_yaml::from_value(value),
        }
    }

    /// Parse a recipe stored under `id` and check that it describes `id`.
    pub fn load(id: &ComponentIdentifier, yaml: &str) -> crate::Result<Self> {
        let recipe = Self::from_yaml(yaml).map_err(|error| Error::InvalidRecipe {
            id: id.clone(),
            error,
        })?;
        let actual = recipe.identifier();
        if !actual.same_version(id) {
            return Err(Error::RecipeMismatch {
                expected: id.clone(),
                actual,
            });
        }
        Ok(recipe)
    }

    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }

    pub fn identifier(&self) -> ComponentIdentifier {
        ComponentIdentifier::new(self.name.clone(), self.version.clone()).with_scope(self.scope)
    }

    pub fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            identifier: self.identifier(),
            dependencies: self
                .dependencies
                .iter()
                .map(|(name, props)| (name.clone(), props.version_requirement.clone()))
                .collect(),
        }
    }
}

/// Identity and dependency requirements of one component version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMetadata {
    pub identifier: ComponentIdentifier,
    pub dependencies: IndexMap<String, VersionRequirement>,
}

impl ComponentMetadata {
    pub fn new(identifier: ComponentIdentifier) -> Self {
        Self {
            identifier,
            dependencies: IndexMap::new(),
        }
    }

    pub fn with_dependency<S: Into<String>>(
        mut self,
        name: S,
        requirement: VersionRequirement,
    ) -> Self {
        self.dependencies.insert(name.into(), requirement);
        self
    }
}

impl fmt::Display for ComponentMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.identifier.fmt(f)
    }
}
