//! CI validation for the endpoint manifest (manifest/endpoints.toml).
//!
//! The manifest is embedded into the library at build time, so a broken
//! entry only shows up at runtime as an unknown operation. These tests
//! deserialize the file independently and check its structural invariants.

use std::collections::HashSet;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Manifest {
    meta: Meta,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Meta {
    schema_version: u32,
    last_validated: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Endpoint {
    operation: String,
    method: String,
    path: String,
    #[serde(default)]
    description: String,
    collection: String,
    #[serde(default)]
    params: Vec<Param>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Param {
    name: String,
    #[serde(rename = "in")]
    location: String,
    #[serde(default)]
    required: bool,
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn load() -> Manifest {
    let content = std::fs::read_to_string("manifest/endpoints.toml")
        .expect("manifest/endpoints.toml should exist and be readable");
    toml::from_str(&content).expect("manifest/endpoints.toml should be valid TOML")
}

#[test]
fn manifest_endpoints_toml_is_valid() {
    let manifest = load();
    assert!(manifest.meta.schema_version >= 1, "schema_version must be at least 1");
    assert!(!manifest.endpoints.is_empty(), "manifest should contain endpoints");

    for ep in &manifest.endpoints {
        assert!(!ep.operation.is_empty(), "operation must not be empty");
        assert!(!ep.collection.is_empty(), "{}: collection must not be empty", ep.operation);
        assert!(ep.path.starts_with('/'), "{}: path must start with '/'", ep.operation);
    }
}

#[test]
fn manifest_operations_are_unique() {
    let manifest = load();
    let mut seen = HashSet::new();
    for ep in &manifest.endpoints {
        assert!(seen.insert(ep.operation.as_str()), "duplicate operation '{}'", ep.operation);
    }
}

#[test]
fn manifest_endpoint_methods_are_valid_http_verbs() {
    let manifest = load();
    let valid_methods = ["GET", "POST", "PUT", "PATCH", "DELETE"];
    for ep in &manifest.endpoints {
        assert!(
            valid_methods.contains(&ep.method.as_str()),
            "endpoint '{}' has invalid method '{}', expected one of {:?}",
            ep.operation,
            ep.method,
            valid_methods
        );
    }
}

#[test]
fn manifest_params_use_known_locations_and_types() {
    let manifest = load();
    let locations = ["query", "body", "header", "formData", "path"];
    let types = ["string", "integer", "number", "boolean", "array", "object"];
    for ep in &manifest.endpoints {
        for param in &ep.params {
            assert!(
                locations.contains(&param.location.as_str()),
                "{}.{}: unknown location '{}'",
                ep.operation,
                param.name,
                param.location
            );
            if let Some(kind) = &param.kind {
                assert!(
                    types.contains(&kind.as_str()),
                    "{}.{}: unknown type '{kind}'",
                    ep.operation,
                    param.name
                );
            }
        }
    }
}

#[test]
fn named_path_placeholders_have_path_params() {
    let manifest = load();
    for ep in &manifest.endpoints {
        let mut rest = ep.path.as_str();
        while let Some(start) = rest.find('{') {
            let Some(end) = rest[start..].find('}') else {
                panic!("{}: unterminated placeholder in '{}'", ep.operation, ep.path);
            };
            let name = &rest[start + 1..start + end];
            if !name.is_empty() {
                assert!(
                    ep.params.iter().any(|p| p.name == name && p.location == "path"),
                    "{}: placeholder '{{{name}}}' has no path param",
                    ep.operation
                );
            }
            rest = &rest[start + end + 1..];
        }
    }
}

#[test]
fn every_operation_resolves_through_the_library() {
    let manifest = load();
    for ep in &manifest.endpoints {
        let resolved = falcon_sdk::endpoint::lookup(&ep.operation)
            .unwrap_or_else(|e| panic!("{}: {e}", ep.operation));
        assert_eq!(resolved.path, ep.path);
    }
}
