#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::json;

use envbus_core::BusError;
use envbus_runtime::correlation::CorrelationRegistry;

#[test]
fn ids_are_prefixed_and_unique() {
    let r = CorrelationRegistry::new("ep");
    let a = r.next_request_id();
    let b = r.next_request_id();
    assert_eq!(a, "ep_0");
    assert_eq!(b, "ep_1");
}

#[tokio::test]
async fn resolve_settles_exactly_once() {
    let r = CorrelationRegistry::new("ep");
    let id = r.next_request_id();
    let h = r.register(id.clone(), "m");
    assert!(r.is_pending(&id));

    assert!(r.resolve(&id, json!(42)).is_some());
    assert!(r.resolve(&id, json!(43)).is_none());
    assert!(r.reject(&id, BusError::Disposed).is_none());

    assert_eq!(h.wait().await.unwrap(), json!(42));
    assert_eq!(r.pending_count(), 0);
}

#[tokio::test]
async fn unknown_id_is_a_no_op() {
    let r = CorrelationRegistry::new("ep");
    let h = r.register(r.next_request_id(), "m");

    assert!(r.resolve("ep_99", json!(null)).is_none());
    assert_eq!(r.pending_count(), 1);

    r.resolve(h.id(), json!("ok"));
    assert_eq!(h.wait().await.unwrap(), json!("ok"));
}

#[tokio::test]
async fn abandon_all_rejects_everything() {
    let r = CorrelationRegistry::new("ep");
    let handles: Vec<_> = (0..4)
        .map(|_| r.register(r.next_request_id(), "m"))
        .collect();

    assert_eq!(r.abandon_all(BusError::Disposed), 4);
    assert_eq!(r.pending_count(), 0);
    for h in handles {
        assert!(matches!(h.wait().await, Err(BusError::Disposed)));
    }
}

#[tokio::test]
async fn forgotten_request_ignores_late_answer() {
    let r = CorrelationRegistry::new("ep");
    let id = r.next_request_id();
    let h = r.register(id.clone(), "m");

    assert!(r.forget(&id));
    assert!(r.resolve(&id, json!(1)).is_none());
    assert!(matches!(h.wait().await, Err(BusError::Disposed)));
}
