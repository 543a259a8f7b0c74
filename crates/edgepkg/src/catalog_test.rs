// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::fixtures::{id, recipe_yaml};
use crate::ErrorKind;

#[rstest]
#[tokio::test]
async fn test_directory_catalog_serves_mirror() {
    let tmp = TempDir::new().unwrap();
    let mirror = FsComponentStore::new(tmp.path());
    let a = id("a", "1.0.0");
    mirror.save_recipe(&a, &recipe_yaml("a", "1.0.0")).await.unwrap();

    let catalog = DirectoryCatalog::new(tmp.path());
    let text = catalog.fetch_recipe_text(&a).await.unwrap();
    assert_eq!(text, recipe_yaml("a", "1.0.0"));

    let listed = catalog
        .list_available("a", &VersionRequirement::any())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].identifier, a);
}

#[rstest]
#[tokio::test]
async fn test_directory_catalog_missing_recipe_is_download_error() {
    let tmp = TempDir::new().unwrap();
    let catalog = DirectoryCatalog::new(tmp.path());

    let err = catalog
        .fetch_recipe_text(&id("missing", "1.0.0"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Download);
}

#[rstest]
#[tokio::test]
async fn test_offline_catalog_lists_nothing_and_fetches_nothing() {
    let listed = OfflineCatalog
        .list_available("a", &VersionRequirement::any())
        .await
        .unwrap();
    assert!(listed.is_empty());

    let err = OfflineCatalog
        .fetch_recipe_text(&id("a", "1.0.0"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Download);
    assert!(err.to_string().contains("a-1.0.0"));
}
