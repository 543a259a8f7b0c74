// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;
use url::Url;

use super::*;
use crate::fixtures::{artifact, id, RecordingDownloader};
use crate::ErrorKind;

fn registry() -> (DownloaderRegistry, Arc<RecordingDownloader>, Arc<RecordingDownloader>) {
    let s3 = Arc::new(RecordingDownloader::default());
    let greengrass = Arc::new(RecordingDownloader::default());
    let registry = DownloaderRegistry::new()
        .with_downloader("s3", s3.clone())
        .with_downloader("greengrass", greengrass.clone());
    (registry, s3, greengrass)
}

#[rstest]
#[case("s3://bucket/a.zip")]
#[case("S3://bucket/a.zip")]
#[case("GreenGrass:a.zip")]
fn test_select_is_case_insensitive(#[case] uri: &str) {
    let (registry, _, _) = registry();
    assert!(registry.select(&artifact(uri)).is_ok());
}

#[rstest]
#[tokio::test]
async fn test_select_dispatches_by_scheme() {
    let tmp = TempDir::new().unwrap();
    let (registry, s3, greengrass) = registry();
    let a = id("a", "1.0.0");

    let s3_artifact = artifact("s3://bucket/a.zip");
    registry
        .select(&s3_artifact)
        .unwrap()
        .download(&a, &s3_artifact, tmp.path())
        .await
        .unwrap();
    let gg_artifact = artifact("greengrass:b.zip");
    registry
        .select(&gg_artifact)
        .unwrap()
        .download(&a, &gg_artifact, tmp.path())
        .await
        .unwrap();

    assert_eq!(s3.downloaded(), vec!["s3://bucket/a.zip".to_string()]);
    assert_eq!(greengrass.downloaded(), vec!["greengrass:b.zip".to_string()]);
}

#[rstest]
fn test_select_unsupported_scheme_names_it() {
    let (registry, _, _) = registry();
    let err = registry
        .select(&artifact("ftp://host/file.zip"))
        .err()
        .expect("ftp should be rejected");

    assert_eq!(err.kind(), ErrorKind::Loading);
    assert!(err.to_string().contains("FTP"), "message was: {err}");
    match err {
        Error::UnsupportedScheme { scheme, supported } => {
            assert_eq!(scheme, "FTP");
            assert_eq!(supported, vec!["S3", "GREENGRASS"]);
        }
        other => panic!("Expected UnsupportedScheme, got: {:?}", other),
    }
}

#[rstest]
#[tokio::test]
async fn test_file_downloader_copies_file() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let source = src.path().join("payload.bin");
    std::fs::write(&source, b"payload").unwrap();

    let file_artifact = ComponentArtifact::new(Url::from_file_path(&source).unwrap());
    let produced = FileDownloader
        .download(&id("a", "1.0.0"), &file_artifact, dest.path())
        .await
        .unwrap()
        .expect("a file is produced");

    assert_eq!(produced, dest.path().join("payload.bin"));
    assert_eq!(std::fs::read(produced).unwrap(), b"payload");
}

#[rstest]
#[tokio::test]
async fn test_file_downloader_missing_source_is_io_error() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let missing = ComponentArtifact::new(Url::from_file_path(src.path().join("nope")).unwrap());

    let result = FileDownloader
        .download(&id("a", "1.0.0"), &missing, dest.path())
        .await;
    assert!(result.is_err());
}
