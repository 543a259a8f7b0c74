// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::fixtures::{id, recipe_yaml, FakeCatalog};
use crate::service::{ServiceDefinition, ServiceNode};
use crate::store::FsComponentStore;
use crate::ErrorKind;

struct Fixture {
    _tmp: TempDir,
    registry: Arc<ServiceRegistry>,
    store: Arc<FsComponentStore>,
}

impl Fixture {
    async fn new(local: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FsComponentStore::new(tmp.path()));
        for version in local {
            store
                .save_recipe(&id("app", version), &recipe_yaml("app", version))
                .await
                .unwrap();
        }
        Self {
            _tmp: tmp,
            registry: Arc::new(ServiceRegistry::new()),
            store,
        }
    }

    fn resolver(&self, catalog: FakeCatalog) -> VersionResolver {
        VersionResolver::new(self.registry.clone(), self.store.clone(), Arc::new(catalog))
    }

    fn activate(&self, version: &str) {
        self.registry.define(
            "app",
            ServiceDefinition::new().with_version(Version::parse(version).unwrap()),
        );
    }
}

fn versions(candidates: &[ComponentMetadata]) -> Vec<String> {
    candidates
        .iter()
        .map(|c| c.identifier.version.to_string())
        .collect()
}

#[rstest]
#[tokio::test]
async fn test_local_then_remote_without_active() {
    let fixture = Fixture::new(&["1.0.0", "1.1.0"]).await;
    let resolver = fixture.resolver(FakeCatalog::default().with_versions("app", &["1.2.0"]));

    let candidates = resolver
        .list_candidates("app", &VersionRequirement::parse("^1").unwrap())
        .await
        .unwrap();
    assert_eq!(versions(&candidates), vec!["1.1.0", "1.0.0", "1.2.0"]);
}

#[rstest]
#[tokio::test]
async fn test_active_version_first_without_duplicate() {
    let fixture = Fixture::new(&["1.0.0", "1.1.0"]).await;
    fixture.activate("1.0.0");
    let resolver = fixture.resolver(FakeCatalog::default());

    let candidates = resolver
        .list_candidates("app", &VersionRequirement::parse("^1").unwrap())
        .await
        .unwrap();
    assert_eq!(versions(&candidates), vec!["1.0.0", "1.1.0"]);
}

#[rstest]
#[tokio::test]
async fn test_unsatisfying_active_version_is_excluded() {
    let fixture = Fixture::new(&["1.0.0", "2.0.0"]).await;
    fixture.activate("1.0.0");
    let resolver = fixture.resolver(FakeCatalog::default());

    let candidates = resolver
        .list_candidates("app", &VersionRequirement::parse(">=2.0.0").unwrap())
        .await
        .unwrap();
    assert_eq!(versions(&candidates), vec!["2.0.0"]);
}

#[rstest]
#[tokio::test]
async fn test_remote_versions_already_listed_are_skipped() {
    let fixture = Fixture::new(&["1.0.0"]).await;
    let resolver =
        fixture.resolver(FakeCatalog::default().with_versions("app", &["1.0.0", "1.3.0"]));

    let candidates = resolver
        .list_candidates("app", &VersionRequirement::any())
        .await
        .unwrap();
    assert_eq!(versions(&candidates), vec!["1.0.0", "1.3.0"]);
}

#[rstest]
#[tokio::test]
async fn test_catalog_failure_is_absorbed() {
    let fixture = Fixture::new(&["1.0.0"]).await;
    let resolver = fixture.resolver(FakeCatalog::default().failing_listing());

    let candidates = resolver
        .list_candidates("app", &VersionRequirement::any())
        .await
        .expect("catalog failure must not fail the listing");
    assert_eq!(versions(&candidates), vec!["1.0.0"]);
}

#[rstest]
#[tokio::test]
async fn test_builtin_active_version_synthesizes_metadata() {
    let fixture = Fixture::new(&[]).await;
    fixture.registry.insert(ServiceNode::new("logger"));
    fixture.registry.register_type("builtin", |name: &str, def: &ServiceDefinition| {
        let node = ServiceNode::new(name).with_builtin(true);
        match &def.version {
            Some(v) => node.with_version(v.clone()),
            None => node,
        }
    });
    fixture.registry.define(
        "app",
        ServiceDefinition::new()
            .with_type("builtin")
            .with_version(Version::new(0, 9, 0))
            .with_dependency("logger"),
    );
    let resolver = fixture.resolver(FakeCatalog::default().with_versions("app", &["1.0.0"]));

    let candidates = resolver
        .list_candidates("app", &VersionRequirement::any())
        .await
        .unwrap();
    assert_eq!(versions(&candidates), vec!["0.9.0", "1.0.0"]);

    let head = &candidates[0];
    assert_eq!(head.identifier.scope, Scope::Public);
    assert_eq!(head.dependencies.len(), 1);
    assert_eq!(head.dependencies["logger"], VersionRequirement::any());
}

#[rstest]
#[tokio::test]
async fn test_active_without_recipe_and_not_builtin_fails() {
    let fixture = Fixture::new(&["1.0.0"]).await;
    fixture.activate("3.0.0");
    let resolver = fixture.resolver(FakeCatalog::default());

    let err = resolver
        .list_candidates("app", &VersionRequirement::any())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Packaging);
    match err {
        Error::ActiveMetadata { id, source } => {
            assert_eq!(id.version, Version::new(3, 0, 0));
            assert!(matches!(*source, Error::RecipeNotFound(_)));
        }
        other => panic!("Expected ActiveMetadata, got: {:?}", other),
    }
}
