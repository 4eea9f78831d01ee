#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]


use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use envbus_core::protocol::message::{decode, encode};
use envbus_core::protocol::init::decode_init;
use envbus_core::protocol::{EnvelopeBusMessage, Purpose, TargetOrigin, INIT_REQUEST};
use envbus_core::BusError;
use envbus_runtime::endpoint::{BusEndpoint, ChannelOptions, EnvelopeOptions, Role};
use envbus_runtime::lifecycle::{from_fn, LifecycleState, RetryPolicy};
use envbus_runtime::transport::memory::pair;
use envbus_runtime::transport::PostMessage;
use harness::*;

#[tokio::test]
async fn both_sides_connect() {
    let p = connected().await;

    assert_eq!(p.channel.role(), Role::Channel);
    assert_eq!(p.envelope.role(), Role::Envelope);
    assert_eq!(p.channel.state(), LifecycleState::Connected);
    assert_eq!(p.envelope.state(), LifecycleState::Connected);
    assert!(p.envelope.is_ready());

    let peer = p.envelope.peer().expect("peer known");
    assert_eq!(peer.endpoint_id.as_deref(), Some(p.channel.id()));
    assert_eq!(peer.origin, HOST);
    assert_eq!(p.envelope.init_context(), Some(init_context()));

    let peer = p.channel.peer().expect("peer known");
    assert_eq!(peer.endpoint_id.as_deref(), Some(p.envelope.id()));
    assert_eq!(peer.origin, FRAME);
    assert_eq!(p.channel.init_context(), None);

    assert_eq!(p.channel.metrics().pending_requests.get(&[]), 0);
}

#[tokio::test]
async fn slow_initializer_connects_after_retries_and_runs_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let slow = from_fn(move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(60)).await;
            Ok(envelope_handlers())
        }
    });

    let p = start(fast(), slow);
    within(p.channel.wait_connected()).await.unwrap();

    assert!(p.channel.metrics().handshake_attempts.total() >= 3);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(p.channel.pending_requests(), 0);
    assert_eq!(p.channel.metrics().pending_requests.get(&[]), 0);

    // Duplicate answers to earlier attempts are ignored.
    quiesce().await;
    assert_eq!(p.channel.state(), LifecycleState::Connected);
    let out = within(p.channel.requests().call(&ECHO, "ok".to_string()))
        .await
        .unwrap();
    assert_eq!(out, "echo:ok");
}

#[tokio::test]
async fn failed_initializer_is_retried_on_next_init_request() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let flaky = from_fn(move |_ctx| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                return Err(BusError::Internal("first boot fails".into()));
            }
            Ok(envelope_handlers())
        }
    });

    let p = start(fast(), flaky);
    within(p.channel.wait_connected()).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn bounded_retries_give_up() {
    let ((host_port, host_inbound), (_frame_port, _frame_inbound)) = pair(HOST, FRAME);
    let channel = BusEndpoint::channel(
        channel_options(RetryPolicy::bounded(Duration::from_millis(10), 3)),
        host_port.clone(),
        host_inbound,
    )
    .unwrap();

    let err = within(channel.wait_connected()).await.unwrap_err();
    assert!(matches!(err, BusError::HandshakeExhausted { attempts: 3 }));
    assert_eq!(channel.state(), LifecycleState::Connecting);
    assert_eq!(channel.metrics().handshake_attempts.total(), 3);
    assert_eq!(channel.pending_requests(), 0);
    assert_eq!(host_port.posted(), 3);
}

#[tokio::test]
async fn retries_keep_at_most_one_init_pending() {
    // Nobody answers on the frame side.
    let ((host_port, host_inbound), (_frame_port, _frame_inbound)) = pair(HOST, FRAME);
    let channel = BusEndpoint::channel(channel_options(fast()), host_port.clone(), host_inbound).unwrap();

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(channel.state(), LifecycleState::Connecting);
        assert!(channel.pending_requests() <= 1);
        assert!(channel.metrics().pending_requests.get(&[]) <= 1);
    }
    assert!(channel.metrics().handshake_attempts.total() >= 5);
    assert!(host_port.posted() >= 5);
}

#[tokio::test]
async fn late_answer_to_a_replaced_attempt_is_ignored() {
    let ((host_port, host_inbound), (frame_port, mut frame_inbound)) = pair(HOST, FRAME);
    let channel = BusEndpoint::channel(
        channel_options(RetryPolicy::unbounded(Duration::from_millis(20))),
        host_port,
        host_inbound,
    )
    .unwrap();

    let first = decode(&within(frame_inbound.recv()).await.unwrap().data).unwrap();
    let second = decode(&within(frame_inbound.recv()).await.unwrap().data).unwrap();
    assert_ne!(first.request_id, second.request_id);

    let stale = EnvelopeBusMessage::response_ok(
        INIT_REQUEST,
        first.request_id.as_deref().unwrap(),
        serde_json::Value::Null,
    );
    frame_port.post_message(encode(&stale).unwrap(), &TargetOrigin::Any).unwrap();
    quiesce().await;

    assert_eq!(channel.state(), LifecycleState::Connecting);
    assert!(channel.peer().is_none());
    assert!(channel.pending_requests() <= 1);
}

#[tokio::test]
async fn request_before_init_is_not_ready() {
    let ((host_port, mut host_inbound), (frame_port, frame_inbound)) = pair(HOST, FRAME);
    let envelope = BusEndpoint::envelope(envelope_options(initializer()), frame_port, frame_inbound);

    let req = EnvelopeBusMessage::request("envelope_echo", "early_0", serde_json::json!("x"));
    host_port
        .post_message(encode(&req).unwrap(), &TargetOrigin::Any)
        .unwrap();

    let ev = within(host_inbound.recv()).await.unwrap();
    let resp = decode(&ev.data).unwrap();
    assert_eq!(resp.purpose, Purpose::Response);
    assert_eq!(resp.request_id.as_deref(), Some("early_0"));
    let err = BusError::from_remote(resp.into_outcome().unwrap_err());
    assert!(matches!(err, BusError::NotReady));
    assert_eq!(envelope.state(), LifecycleState::Connecting);
}

#[tokio::test]
async fn response_from_foreign_origin_is_ignored() {
    // Drive the envelope side by hand.
    let ((host_port, host_inbound), (frame_port, mut frame_inbound)) = pair(HOST, FRAME);
    let channel = BusEndpoint::channel(
        channel_options(RetryPolicy::unbounded(Duration::from_secs(30))),
        host_port,
        host_inbound,
    )
    .unwrap();

    let ev = within(frame_inbound.recv()).await.unwrap();
    assert_eq!(ev.origin, HOST);
    let init = decode(&ev.data).unwrap();
    assert_eq!(init.purpose, Purpose::Request);
    assert_eq!(init.msg_type, INIT_REQUEST);
    assert_eq!(init.target_endpoint_id.as_deref(), Some(channel.id()));
    let (req, ctx) = decode_init(init.data.as_ref()).unwrap();
    assert_eq!(req.origin, HOST);
    assert_eq!(req.envelope_server_id, channel.id());
    assert_eq!(ctx, init_context());

    let request_id = init.request_id.clone().unwrap();
    let answer = encode(&EnvelopeBusMessage::response_ok(
        INIT_REQUEST,
        request_id.as_str(),
        serde_json::Value::Null,
    ))
    .unwrap();

    // Valid request id, wrong sender origin.
    frame_port.post_as("https://evil.test", answer.clone()).unwrap();
    quiesce().await;
    assert_eq!(channel.state(), LifecycleState::Connecting);
    assert_eq!(
        channel.metrics().messages_dropped.get(&[("reason", "origin")]),
        1
    );

    frame_port.post_message(answer, &TargetOrigin::Any).unwrap();
    within(channel.wait_connected()).await.unwrap();
}

#[tokio::test]
async fn message_for_another_connection_is_dropped() {
    let p = connected().await;
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    p.envelope.notifications().subscribe(&PING, move |_: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let foreign = EnvelopeBusMessage::notification("envelope_ping", serde_json::json!(1))
        .addressed_to(Some("someone-else"));
    p.host_port
        .post_message(encode(&foreign).unwrap(), &TargetOrigin::Any)
        .unwrap();
    p.channel.notifications().send(&PING, 2).unwrap();

    eventually(|| seen.load(Ordering::SeqCst) == 1).await;
    quiesce().await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(
        p.envelope
            .metrics()
            .messages_dropped
            .get(&[("reason", "foreign_target")]),
        1
    );
}

#[tokio::test]
async fn malformed_frames_are_dropped_without_disturbing_the_bus() {
    let p = connected().await;

    p.host_port.post_as(HOST, "not json".to_string()).unwrap();
    p.host_port
        .post_as(HOST, r#"{"purpose":"REQUEST","type":"envelope_echo","data":"x"}"#.to_string())
        .unwrap();
    quiesce().await;

    assert_eq!(
        p.envelope
            .metrics()
            .messages_dropped
            .get(&[("reason", "malformed")]),
        2
    );
    let out = within(p.channel.requests().call(&ECHO, "still".to_string()))
        .await
        .unwrap();
    assert_eq!(out, "echo:still");
}

#[tokio::test]
async fn wildcard_target_is_pinned_to_the_peer_after_connecting() {
    let p = start_open();
    within(p.channel.wait_connected()).await.unwrap();
    within(p.envelope.wait_connected()).await.unwrap();

    let peer = p.channel.peer().expect("peer known");
    assert_eq!(peer.origin, FRAME);
    assert_eq!(peer.endpoint_id.as_deref(), Some(p.envelope.id()));

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    p.envelope.notifications().subscribe(&PING, move |_: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let statuses = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&statuses);
    p.channel.notifications().subscribe(&STATUS, move |_: String| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let ping = EnvelopeBusMessage::notification("envelope_ping", serde_json::json!(1));
    p.host_port
        .post_as("https://evil.test", encode(&ping).unwrap())
        .unwrap();
    let status = EnvelopeBusMessage::notification("channel_status", serde_json::json!("forged"));
    p.frame_port
        .post_as("https://evil.test", encode(&status).unwrap())
        .unwrap();
    quiesce().await;

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(statuses.load(Ordering::SeqCst), 0);
    assert_eq!(
        p.envelope.metrics().messages_dropped.get(&[("reason", "origin")]),
        1
    );
    assert_eq!(
        p.channel.metrics().messages_dropped.get(&[("reason", "origin")]),
        1
    );

    // The real peer still gets through both ways.
    p.channel.notifications().send(&PING, 2).unwrap();
    p.envelope.notifications().send(&STATUS, "ok".to_string()).unwrap();
    eventually(|| seen.load(Ordering::SeqCst) == 1 && statuses.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn envelope_built_for_host_accepts_only_the_host_origin() {
    let cfg = envbus_runtime::config::load_from_str(
        r#"
version: 1
endpoint:
  origin: "https://host.example"
  target_origin: "*"
handshake:
  retry_interval_ms: 10
locator:
  target_origin: "https://envelopes.example"
"#,
    )
    .unwrap();
    let envelope_origin = cfg.locator.target_origin.as_str().to_string();
    let ((host_port, host_inbound), (frame_port, frame_inbound)) =
        pair(&cfg.endpoint.origin, &envelope_origin);

    let envelope = BusEndpoint::envelope(
        EnvelopeOptions::for_host(&cfg, initializer(), channel_api()),
        frame_port,
        frame_inbound,
    );
    let channel = BusEndpoint::channel(
        ChannelOptions::from_config(&cfg, init_context(), channel_handlers(), envelope_api()),
        host_port.clone(),
        host_inbound,
    )
    .unwrap();
    within(channel.wait_connected()).await.unwrap();
    within(envelope.wait_connected()).await.unwrap();
    assert_eq!(channel.peer().unwrap().origin, "https://envelopes.example");

    // A frame claiming the envelope's own origin is not the host.
    let ping = EnvelopeBusMessage::notification("envelope_ping", serde_json::json!(1));
    host_port
        .post_as("https://envelopes.example", encode(&ping).unwrap())
        .unwrap();
    quiesce().await;
    assert_eq!(
        envelope.metrics().messages_dropped.get(&[("reason", "origin")]),
        1
    );
}
