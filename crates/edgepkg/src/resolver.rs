// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Candidate version listing, preferring the version already running.

use std::sync::Arc;

use semver::Version;

use crate::catalog::ComponentCatalog;
use crate::ident::{ComponentIdentifier, Scope, VersionRequirement};
use crate::recipe::ComponentMetadata;
use crate::service::ServiceRegistry;
use crate::store::ComponentStore;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./resolver_test.rs"]
mod resolver_test;

/// Lists the versions of a component that may satisfy a requirement.
#[derive(Clone)]
pub struct VersionResolver {
    registry: Arc<ServiceRegistry>,
    store: Arc<dyn ComponentStore>,
    catalog: Arc<dyn ComponentCatalog>,
}

impl VersionResolver {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        store: Arc<dyn ComponentStore>,
        catalog: Arc<dyn ComponentCatalog>,
    ) -> Self {
        Self {
            registry,
            store,
            catalog,
        }
    }

    /// Candidate metadata for `name`, in order of preference: the active
    /// version when it satisfies `requirement`, then locally stored
    /// versions, then versions advertised by the catalog.
    ///
    /// Each component version appears at most once. Only a failure to
    /// resolve the active version's metadata is returned as an error;
    /// local and catalog listing failures just contribute nothing.
    pub async fn list_candidates(
        &self,
        name: &str,
        requirement: &VersionRequirement,
    ) -> Result<Vec<ComponentMetadata>> {
        let active = self.find_active_and_satisfied(name, requirement).await?;

        let mut candidates = match self.store.list_available(name, requirement).await {
            Ok(local) => local,
            Err(err) => {
                tracing::warn!(component = %name, %err, "failed to list locally stored versions");
                Vec::new()
            }
        };

        if let Some(active) = active {
            tracing::debug!(
                component = %name,
                version = %active.identifier.version,
                "active version satisfies the requirement, placing it first"
            );
            candidates.retain(|c| !c.identifier.same_version(&active.identifier));
            candidates.insert(0, active);
        }

        match self.catalog.list_available(name, requirement).await {
            Ok(remote) => {
                for metadata in remote {
                    if !candidates
                        .iter()
                        .any(|c| c.identifier.same_version(&metadata.identifier))
                    {
                        candidates.push(metadata);
                    }
                }
            }
            Err(err) => {
                tracing::info!(component = %name, %err, "failed to list versions from the catalog");
            }
        }

        tracing::debug!(
            component = %name,
            candidates = ?candidates.iter().map(|c| c.identifier.to_string()).collect::<Vec<_>>(),
            "found candidate versions"
        );
        Ok(candidates)
    }

    async fn find_active_and_satisfied(
        &self,
        name: &str,
        requirement: &VersionRequirement,
    ) -> Result<Option<ComponentMetadata>> {
        let Some(version) = self.registry.find_active(name) else {
            return Ok(None);
        };
        if !requirement.satisfied_by(&version) {
            return Ok(None);
        }

        let id = ComponentIdentifier::new(name, version.clone());
        match self.store.get_metadata(&id).await {
            Ok(metadata) => Ok(Some(metadata)),
            // Builtin services have no recipe on disk.
            Err(err) => match self.builtin_metadata(name, &version) {
                Some(metadata) => Ok(Some(metadata)),
                None => Err(Error::ActiveMetadata {
                    id,
                    source: Box::new(err),
                }),
            },
        }
    }

    /// Metadata synthesized from a builtin service's live dependency edges.
    fn builtin_metadata(&self, name: &str, version: &Version) -> Option<ComponentMetadata> {
        let service = self.registry.locate(name).ok()?;
        if !service.is_builtin() {
            return None;
        }
        let dependencies = service
            .dependencies()
            .keys()
            .map(|dep| (dep.clone(), VersionRequirement::any()))
            .collect();
        Some(ComponentMetadata {
            identifier: ComponentIdentifier::new(name, version.clone()).with_scope(Scope::Public),
            dependencies,
        })
    }
}
