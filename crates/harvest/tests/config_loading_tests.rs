//! Table-driven tests for configuration loading and validation.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use common::config_json;
use harvest::catalog::MemoryCatalog;
use harvest::config::{load_config, load_config_from_str};
use harvest::{Pipeline, PipelineConfig};

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    expected_error: Option<&'static str>,
}

const JSON_CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": { "url": "https://ckan.example.org" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1",
            "root_directory": "/data",
            "temp_directory": "/var/tmp/harvest",
            "catalog": {
                "url": "http://localhost:5000",
                "api_key_env": "CKAN_TOKEN",
                "default_organization": "City Archive",
                "timeout_secs": 10,
                "retry": { "attempts": 5, "delay_ms": 250 }
            },
            "scan": { "workers": 4, "max_archive_depth": 3, "extensions": [".PDF", "csv"] },
            "validation": { "max_pdf_pages": 500, "max_sheets": 20, "max_features": 1000 },
            "field_map": { "file_name": "name", "keywords": "tags" },
            "dataset_extras": { "license_id": "cc-by" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "dry_run_without_url",
        config_json: r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": { "dry_run": true }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{
            "version": "2",
            "root_directory": "/data",
            "catalog": { "url": "https://ckan.example.org" }
        }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version"),
    },
    ConfigTestCase {
        name: "missing_url",
        config_json: r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": {}
        }"#,
        should_succeed: false,
        expected_error: Some("catalog.url"),
    },
    ConfigTestCase {
        name: "empty_root",
        config_json: r#"{
            "version": "1",
            "root_directory": "  ",
            "catalog": { "url": "https://ckan.example.org" }
        }"#,
        should_succeed: false,
        expected_error: Some("root_directory"),
    },
    ConfigTestCase {
        name: "zero_retry_attempts",
        config_json: r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": { "url": "https://ckan.example.org", "retry": { "attempts": 0 } }
        }"#,
        should_succeed: false,
        expected_error: Some("retry.attempts"),
    },
    ConfigTestCase {
        name: "zero_archive_depth",
        config_json: r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": { "url": "https://ckan.example.org" },
            "scan": { "max_archive_depth": 0 }
        }"#,
        should_succeed: false,
        expected_error: Some("max_archive_depth"),
    },
    ConfigTestCase {
        name: "blank_field_map_target",
        config_json: r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": { "url": "https://ckan.example.org" },
            "field_map": { "title": "" }
        }"#,
        should_succeed: false,
        expected_error: Some("field_map"),
    },
    ConfigTestCase {
        name: "unsupported_extension",
        config_json: r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": { "url": "https://ckan.example.org" },
            "scan": { "extensions": ["pdf", ".docx"] }
        }"#,
        should_succeed: false,
        expected_error: Some("scan.extensions"),
    },
    ConfigTestCase {
        name: "malformed_json",
        config_json: r#"{ "version": "1", "root_directory": "#,
        should_succeed: false,
        expected_error: Some("parse config JSON"),
    },
];

#[test]
fn test_json_config_loading() {
    for test_case in JSON_CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            let err = match result {
                Ok(_) => panic!("Test '{}': Expected failure but succeeded", test_case.name),
                Err(e) => e.to_string(),
            };
            if let Some(expected) = test_case.expected_error {
                assert!(
                    err.contains(expected),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected,
                    err
                );
            }
        }
    }
}

#[test]
fn test_load_yaml_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("harvest.yaml");
    fs::write(
        &path,
        r#"
version: "1"
root_directory: /data/share
catalog:
  url: https://ckan.example.org
  default_organization: City Archive
scan:
  workers: 2
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.root_directory, "/data/share");
    assert_eq!(config.scan.workers, 2);
    assert_eq!(
        config.catalog.default_organization.as_deref(),
        Some("City Archive")
    );
}

#[test]
fn test_missing_file_reports_path() {
    let err = load_config("/nonexistent/harvest.json").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/harvest.json"));
}

#[test]
fn test_pipeline_config_from_loaded_file() {
    let config = load_config_from_str(JSON_CONFIG_TESTS[1].config_json).unwrap();
    let pipeline_config = PipelineConfig::from_config(&config);

    assert_eq!(
        pipeline_config.default_organization.as_deref(),
        Some("City Archive")
    );
    assert_eq!(pipeline_config.max_archive_depth, 3);
    assert!(pipeline_config.workers >= 1 && pipeline_config.workers <= 4);
    assert_eq!(pipeline_config.retry.attempts(), 5);
    assert_eq!(
        pipeline_config.dataset_extras.get("license_id"),
        Some(&serde_json::Value::String("cc-by".into()))
    );
    assert_eq!(pipeline_config.field_map.len(), 2);
    assert!(pipeline_config.extensions.allows(Path::new("scan.pdf")));
    assert!(!pipeline_config.extensions.allows(Path::new("notes.txt")));
}

#[test]
fn test_dry_run_config_drives_a_pipeline() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("share");
    let temp = tmp.path().join("scratch");
    fs::create_dir_all(root.join("reports")).unwrap();
    fs::write(root.join("reports/a.csv"), "x\n1\n").unwrap();

    let path = tmp.path().join("harvest.json");
    fs::write(
        &path,
        config_json(
            root.to_str().unwrap(),
            temp.to_str().unwrap(),
            Some("City Archive"),
        ),
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert!(config.catalog.dry_run);

    let pipeline = Pipeline::from_config(
        Arc::new(PipelineConfig::from_config(&config)),
        MemoryCatalog::new(),
    );
    let report = pipeline.run().unwrap();

    assert_eq!(report.sync.resources_created, 1);
    assert!(pipeline.catalog().dataset("reports").is_some());
}
