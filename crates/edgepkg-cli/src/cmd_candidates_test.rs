// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

use edgepkg::ComponentIdentifier;
use rstest::rstest;
use serde_yaml::Value;

use super::*;

#[rstest]
fn test_candidates_yaml_quotes_dependency_names() {
    let id: ComponentIdentifier = "hello@1.0.0".parse().unwrap();
    let mut candidate = ComponentMetadata::new(id);
    candidate
        .dependencies
        .insert("odd: name".to_string(), VersionRequirement::parse(">=1.0.0").unwrap());
    candidate
        .dependencies
        .insert("#comment".to_string(), VersionRequirement::parse("*").unwrap());

    let yaml = candidates_yaml("hello", &VersionRequirement::any(), &[candidate]).unwrap();
    let doc: Value = serde_yaml::from_str(&yaml).unwrap();

    assert_eq!(doc["name"].as_str(), Some("hello"));
    let first = &doc["candidates"][0];
    assert_eq!(first["version"].as_str(), Some("1.0.0"));
    let dependencies = first["dependencies"].as_mapping().unwrap();
    assert_eq!(dependencies.len(), 2);
    assert_eq!(first["dependencies"]["odd: name"].as_str(), Some(">=1.0.0"));
    assert_eq!(first["dependencies"]["#comment"].as_str(), Some("*"));
}

#[rstest]
fn test_candidates_yaml_without_candidates() {
    let yaml = candidates_yaml("hello", &VersionRequirement::any(), &[]).unwrap();
    let doc: Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(doc["candidates"].as_sequence().map(Vec::len), Some(0));
}
