#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use envbus_core::protocol::TargetOrigin;
use envbus_runtime::locator::{EnvelopeLocator, EnvelopeMapping};

fn locator() -> EnvelopeLocator {
    EnvelopeLocator::new(
        TargetOrigin::parse("https://host.example"),
        vec![
            EnvelopeMapping::new("dmn", "*.dmn", "dist/dmn", "dmn-envelope.html"),
            EnvelopeMapping::new("bpmn", "*.bpmn*", "dist/bpmn", "bpmn-envelope.html"),
            EnvelopeMapping::new("scesim", "test-*.scesim", "dist/scesim", "scesim-envelope.html"),
            EnvelopeMapping::new("readme", "README", "", "text-envelope.html"),
        ],
    )
}

#[test]
fn wildcard_matches_whole_name() {
    let l = locator();
    assert_eq!(l.mapping_for("model.dmn").unwrap().mapping_type, "dmn");
    assert_eq!(l.mapping_for(".dmn").unwrap().mapping_type, "dmn");
    assert!(l.mapping_for("model.dmn.bak").is_none());
    assert!(l.mapping_for("model.DMN").is_none());
}

#[test]
fn wildcard_in_several_places() {
    let l = locator();
    assert_eq!(l.mapping_for("flow.bpmn").unwrap().mapping_type, "bpmn");
    assert_eq!(l.mapping_for("flow.bpmn2").unwrap().mapping_type, "bpmn");
    assert_eq!(l.mapping_for("test-a.scesim").unwrap().mapping_type, "scesim");
    assert!(l.mapping_for("a-test.scesim").is_none());
}

#[test]
fn exact_pattern_without_wildcard() {
    let l = locator();
    let m = l.mapping_for("README").unwrap();
    assert_eq!(m.envelope_path, "text-envelope.html");
    assert_eq!(m.file_pattern(), "README");
    assert!(l.mapping_for("README.md").is_none());
}

#[test]
fn first_match_wins() {
    let l = EnvelopeLocator::new(
        TargetOrigin::Any,
        vec![
            EnvelopeMapping::new("specific", "model.dmn", "", "a.html"),
            EnvelopeMapping::new("generic", "*.dmn", "", "b.html"),
        ],
    );
    assert_eq!(l.mapping_for("model.dmn").unwrap().mapping_type, "specific");
    assert_eq!(l.mapping_for("other.dmn").unwrap().mapping_type, "generic");
    assert_eq!(l.mappings().len(), 2);
}
