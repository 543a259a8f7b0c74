// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Component identity and version requirements.

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::Error;

#[cfg(test)]
#[path = "./ident_test.rs"]
mod ident_test;

/// Requirement string matching any released version.
pub const ANY_VERSION: &str = "*";

/// Visibility scope of a component.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Private,
    Public,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Private => f.write_str("private"),
            Scope::Public => f.write_str("public"),
        }
    }
}

/// Identifies one version of one component.
///
/// This is the key of every cache location: two different recipes are
/// never stored under the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct ComponentIdentifier {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub scope: Scope,
}

impl ComponentIdentifier {
    /// Create a private-scope identifier.
    pub fn new<S: Into<String>>(name: S, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            scope: Scope::Private,
        }
    }

    /// Same identifier with a different scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// True when `other` names the same component version, ignoring scope.
    pub fn same_version(&self, other: &ComponentIdentifier) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

impl FromStr for ComponentIdentifier {
    type Err = Error;

    /// Parse `name@version`.
    fn from_str(s: &str) -> crate::Result<Self> {
        let (name, version) = s
            .rsplit_once('@')
            .ok_or_else(|| Error::InvalidIdentifier(s.to_string()))?;
        if name.is_empty() {
            return Err(Error::InvalidIdentifier(s.to_string()));
        }
        let version =
            Version::parse(version).map_err(|_| Error::InvalidIdentifier(s.to_string()))?;
        Ok(Self::new(name, version))
    }
}

/// A predicate over semantic versions.
///
/// Evaluation is pure: it depends only on the version and the
/// requirement expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VersionRequirement(VersionReq);

impl VersionRequirement {
    /// Parse a requirement expression such as `>=1.0.0, <2.0.0`.
    pub fn parse(requirement: &str) -> crate::Result<Self> {
        VersionReq::parse(requirement)
            .map(Self)
            .map_err(|error| Error::InvalidRequirement {
                requirement: requirement.to_string(),
                error,
            })
    }

    /// The requirement satisfied by every released version.
    pub fn any() -> Self {
        Self(VersionReq::STAR)
    }

    /// Pin to exactly one version.
    pub fn exact(version: &Version) -> Self {
        Self(VersionReq {
            comparators: vec![semver::Comparator {
                op: semver::Op::Exact,
                major: version.major,
                minor: Some(version.minor),
                patch: Some(version.patch),
                pre: version.pre.clone(),
            }],
        })
    }

    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.0.matches(version)
    }
}

impl Default for VersionRequirement {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for VersionRequirement {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}
