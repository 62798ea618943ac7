// SPDX-License-Identifier: MIT OR Apache-2.0
//! File loading tests for `errmap-config`.

use errmap_config::{ConfigError, build_registry, load_config, validate_config};
use errmap_stack::CaptureMode;
use std::io::Write;

const SAMPLE: &str = r#"
[stack]
capture = "off"
hidden = ["tokio::"]

[[classes]]
name = "HttpError"

[classes.errors.TIMEOUT]
message = "Upstream timed out"
status = 504

[classes.errors.UNAVAILABLE]
message = "Service unavailable"
status = 503

[[classes]]
name = "GatewayError"
extends = "HttpError"

[classes.errors.BAD_GATEWAY]
message = "Bad gateway"
status = 502
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write");
    file
}

#[test]
fn load_none_gives_defaults() {
    let cfg = load_config(None).unwrap();
    assert!(cfg.classes.is_empty());
}

#[test]
fn load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    let err = load_config(Some(&path)).unwrap_err();
    match err {
        ConfigError::FileNotFound { path: p } => assert!(p.ends_with("nope.toml")),
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}

#[test]
fn load_invalid_file() {
    let file = write_config("[[classes]\nname =");
    assert!(matches!(
        load_config(Some(file.path())),
        Err(ConfigError::ParseError { .. })
    ));
}

#[test]
fn load_sample_and_build() {
    let file = write_config(SAMPLE);
    let cfg = load_config(Some(file.path())).unwrap();
    assert_eq!(cfg.classes.len(), 2);
    assert!(validate_config(&cfg).unwrap().is_empty());

    let registry = build_registry(&cfg).unwrap();
    let http = registry.get("HttpError").unwrap();
    let gateway = registry.get("GatewayError").unwrap();
    assert_eq!(gateway.stack_options().hidden, vec!["tokio::".to_string()]);

    let err = gateway.error("TIMEOUT").unwrap();
    assert_eq!(err.name(), "GatewayError");
    assert_eq!(err.details().get("status"), Some(504.into()));
    assert!(http.is_instance(&err));
    assert!(http.error("BAD_GATEWAY").is_err());

    if std::env::var_os("ERRMAP_STACK_CAPTURE").is_none() {
        assert_eq!(gateway.stack_options().capture, CaptureMode::Off);
        assert_eq!(err.stack(), "GatewayError: Upstream timed out");
    }
}

#[test]
fn registry_iterates_in_build_order() {
    let file = write_config(SAMPLE);
    let cfg = load_config(Some(file.path())).unwrap();
    let registry = build_registry(&cfg).unwrap();
    let names: Vec<&str> = registry.iter().map(|c| c.name()).collect();
    assert_eq!(names, ["HttpError", "GatewayError"]);
    assert!(!registry.is_empty());
}
