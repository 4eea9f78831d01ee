#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use envbus_core::protocol::TargetOrigin;
use envbus_runtime::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
handshake:
  retry_interval_ms: 100
  max_attempt: 5 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.endpoint.origin, "null");
    assert!(cfg.endpoint.target_origin.is_wildcard());

    let retry = cfg.handshake.retry_policy();
    assert_eq!(retry.interval, Duration::from_millis(100));
    assert_eq!(retry.max_attempts, None);
    assert!(cfg.locator.mappings.is_empty());
}

#[test]
fn full_config_builds_locator() {
    let ok = r#"
version: 1
endpoint:
  origin: "https://host.example"
  target_origin: "https://frame.example/"
handshake:
  retry_interval_ms: 250
  max_attempts: 8
locator:
  target_origin: "https://host.example"
  mappings:
    - type: dmn
      file_pattern: "*.dmn"
      resources_path_prefix: "dist/dmn"
      envelope_path: "dmn-envelope.html"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(
        cfg.endpoint.target_origin,
        TargetOrigin::Exact("https://frame.example".into())
    );
    assert_eq!(cfg.handshake.retry_policy().max_attempts, Some(8));

    let locator = cfg.locator.build_locator();
    let m = locator.mapping_for("model.dmn").expect("mapped");
    assert_eq!(m.mapping_type, "dmn");
    assert_eq!(m.envelope_path, "dmn-envelope.html");
}

#[test]
fn rejects_unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn rejects_out_of_range_handshake() {
    for bad in [
        "version: 1\nhandshake:\n  retry_interval_ms: 1\n",
        "version: 1\nhandshake:\n  max_attempts: 0\n",
        "version: 1\nendpoint:\n  origin: \"\"\n",
    ] {
        let err = config::load_from_str(bad).expect_err("must fail");
        assert_eq!(err.code().as_str(), "CONFIG", "{bad}");
    }
}

#[test]
fn rejects_incomplete_mapping() {
    let bad = r#"
version: 1
locator:
  mappings:
    - type: dmn
      file_pattern: ""
      envelope_path: "dmn-envelope.html"
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("file_pattern"));
}
