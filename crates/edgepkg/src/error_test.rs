// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

use std::io;

use miette::Diagnostic;
use rstest::rstest;

use super::*;
use crate::fixtures::id;

fn io_error() -> io::Error {
    io::Error::other("boom")
}

#[rstest]
#[case(Error::RecipeNotFound(id("a", "1.0.0")), ErrorKind::Loading)]
#[case(Error::UnsupportedScheme { scheme: "FTP".into(), supported: vec![] }, ErrorKind::Loading)]
#[case(Error::CreateArtifactDir { path: "/x".into(), error: io_error() }, ErrorKind::Loading)]
#[case(Error::ArtifactDownload { id: id("a", "1.0.0"), artifact: "s3://b/a".into(), error: io_error() }, ErrorKind::Download)]
#[case(Error::catalog("down"), ErrorKind::Download)]
#[case(Error::InvalidIdentifier("a".into()), ErrorKind::Packaging)]
#[case(Error::NoDefinition("a".into()), ErrorKind::ServiceLoad)]
fn test_kind(#[case] error: Error, #[case] expected: ErrorKind) {
    assert_eq!(error.kind(), expected);
}

#[rstest]
fn test_unsupported_scheme_message_and_help() {
    let err = Error::UnsupportedScheme {
        scheme: "FTP".into(),
        supported: vec!["S3".into(), "GREENGRASS".into()],
    };
    assert_eq!(err.to_string(), "artifact URI scheme FTP is not supported yet");
    let help = err.help().map(|h| h.to_string());
    assert_eq!(help.as_deref(), Some("Supported schemes: S3, GREENGRASS"));
}

#[rstest]
fn test_active_metadata_keeps_source() {
    let err = Error::ActiveMetadata {
        id: id("a", "1.0.0"),
        source: Box::new(Error::RecipeNotFound(id("a", "1.0.0"))),
    };
    assert_eq!(err.kind(), ErrorKind::Packaging);
    let source = std::error::Error::source(&err).map(|s| s.to_string());
    assert_eq!(source.as_deref(), Some("No recipe found for component a-1.0.0"));
}

#[rstest]
fn test_diagnostic_codes() {
    let err = Error::NoDefinition("a".into());
    let code = err.code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("edgepkg::service::no_definition"));
}
