#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use envbus_runtime::api::Listener;
use envbus_runtime::shared::SharedValueStore;

fn counting() -> (Arc<AtomicUsize>, Listener) {
    let n = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&n);
    (n, Arc::new(move |_: &Value| {
        c.fetch_add(1, Ordering::SeqCst);
    }))
}

#[test]
fn provider_prefers_current_value_over_default() {
    let s = SharedValueStore::new();
    assert_eq!(s.default_answer("theme"), None);

    s.provide_default("theme", json!("light"));
    assert!(s.is_provider("theme"));
    assert_eq!(s.default_answer("theme"), Some(json!("light")));

    s.apply("theme", json!("dark"));
    assert_eq!(s.default_answer("theme"), Some(json!("dark")));
}

#[test]
fn non_provider_never_answers() {
    let s = SharedValueStore::new();
    s.apply("theme", json!("dark"));
    assert!(!s.is_provider("theme"));
    assert_eq!(s.default_answer("theme"), None);
}

#[test]
fn apply_always_notifies() {
    let s = SharedValueStore::new();
    let (n, l) = counting();
    let sub = s.subscribe("theme", l);

    assert_eq!(s.apply("theme", json!(1)), 1);
    assert_eq!(s.apply("theme", json!(1)), 1);
    assert_eq!(n.load(Ordering::SeqCst), 2);

    assert!(s.unsubscribe(&sub));
    assert_eq!(s.apply("theme", json!(2)), 0);
    assert_eq!(s.get("theme"), Some(json!(2)));
}

#[test]
fn null_is_a_value() {
    let s = SharedValueStore::new();
    let (n, l) = counting();
    assert!(!s.replay("theme", &l));

    s.apply("theme", Value::Null);
    assert_eq!(s.get("theme"), Some(Value::Null));
    assert!(s.replay("theme", &l));
    assert_eq!(n.load(Ordering::SeqCst), 1);
}
