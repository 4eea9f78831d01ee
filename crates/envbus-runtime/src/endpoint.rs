//! Bus endpoint: one side of a channel/envelope connection.
//!
//! Responsibilities:
//! - own the transport adapter, correlation registry, listeners and shared store
//! - run the inbound loop (validate -> address check -> dispatch by purpose)
//! - drive the handshake (channel polls, envelope answers)
//! - tear everything down on `dispose`
//!
//! Both roles share this type; they differ in which side initiates the
//! handshake and where the local implementation comes from.

use std::sync::{Arc, Mutex, RwLock, Weak};

use serde_json::Value;
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use uuid::Uuid;

use envbus_core::error::{BusError, Result};
use envbus_core::protocol::init::{decode_init, encode_init};
use envbus_core::protocol::{
    EnvelopeBusMessage, InitContext, InitRequest, Purpose, TargetOrigin, INIT_REQUEST,
};

use crate::api::{ApiContract, ListenerSet, Notifications, RequestHandlers, Requests, SharedValues};
use crate::config::BusConfig;
use crate::correlation::{CorrelationRegistry, PendingHandle};
use crate::lifecycle::handshake::poll_init;
use crate::lifecycle::{EnvelopeInitializer, Lifecycle, LifecycleState, RetryPolicy};
use crate::obs::BusMetrics;
use crate::transport::{Inbound, PostMessage, RawEvent, TransportAdapter};

/// Which side of the connection an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Host side; embeds the envelope and initiates the handshake.
    Channel,
    /// Embedded side; answers the handshake.
    Envelope,
}

/// What an endpoint knows about the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// `None` when the envelope did not say who it is in its init answer.
    pub endpoint_id: Option<String>,
    pub origin: String,
}

/// Channel-side construction parameters.
pub struct ChannelOptions {
    /// Our own origin, announced in the init request.
    pub origin: String,
    pub target_origin: TargetOrigin,
    pub retry: RetryPolicy,
    pub init_context: InitContext,
    /// Implementation of the channel API (what the envelope may call).
    pub local: RequestHandlers,
    /// Envelope API (what we may call).
    pub remote: ApiContract,
}

impl ChannelOptions {
    pub fn from_config(
        cfg: &BusConfig,
        init_context: InitContext,
        local: RequestHandlers,
        remote: ApiContract,
    ) -> Self {
        Self {
            origin: cfg.endpoint.origin.clone(),
            target_origin: cfg.endpoint.target_origin.clone(),
            retry: cfg.handshake.retry_policy(),
            init_context,
            local,
            remote,
        }
    }
}

/// Envelope-side construction parameters.
pub struct EnvelopeOptions {
    pub target_origin: TargetOrigin,
    pub initializer: Arc<dyn EnvelopeInitializer>,
    /// Channel API (what we may call).
    pub remote: ApiContract,
}

impl EnvelopeOptions {
    /// Envelope embedded by the host `cfg` describes: only frames from the
    /// host's own origin are accepted, and replies go back there.
    pub fn for_host(
        cfg: &BusConfig,
        initializer: Arc<dyn EnvelopeInitializer>,
        remote: ApiContract,
    ) -> Self {
        Self {
            target_origin: TargetOrigin::parse(&cfg.endpoint.origin),
            initializer,
            remote,
        }
    }
}

pub(crate) struct EndpointInner {
    pub(crate) id: String,
    role: Role,
    adapter: TransportAdapter,
    pub(crate) registry: CorrelationRegistry,
    local: OnceCell<Arc<RequestHandlers>>,
    initializer: Option<Arc<dyn EnvelopeInitializer>>,
    pub(crate) notifications: ListenerSet,
    pub(crate) shared: crate::shared::SharedValueStore,
    pub(crate) remote: ApiContract,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) metrics: Arc<BusMetrics>,
    peer: RwLock<Option<PeerInfo>>,
    init_context: RwLock<Option<InitContext>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EndpointInner {
    fn new(
        role: Role,
        port: Arc<dyn PostMessage>,
        target_origin: TargetOrigin,
        local: Option<RequestHandlers>,
        initializer: Option<Arc<dyn EnvelopeInitializer>>,
        remote: ApiContract,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let metrics = Arc::new(BusMetrics::default());
        Self {
            registry: CorrelationRegistry::new(id.clone()),
            id,
            role,
            adapter: TransportAdapter::new(port, target_origin, Arc::clone(&metrics)),
            local: OnceCell::new_with(local.map(Arc::new)),
            initializer,
            notifications: ListenerSet::new(),
            shared: crate::shared::SharedValueStore::new(),
            remote,
            lifecycle: Lifecycle::new(),
            metrics,
            peer: RwLock::new(None),
            init_context: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn peer(&self) -> Option<PeerInfo> {
        self.peer.read().ok().and_then(|p| p.clone())
    }

    /// Id of the connection this endpoint belongs to: our own id on the
    /// channel, the channel's id (once known) on the envelope.
    fn connection_id(&self) -> Option<String> {
        match self.role {
            Role::Channel => Some(self.id.clone()),
            Role::Envelope => self.peer().and_then(|p| p.endpoint_id),
        }
    }

    /// Send one message. Nothing reaches the transport after disposal.
    pub(crate) fn post(&self, msg: EnvelopeBusMessage) -> Result<()> {
        if self.lifecycle.is_disposed() {
            return Err(BusError::Disposed);
        }
        let msg = msg.addressed_to(self.connection_id().as_deref());
        self.adapter.send(&msg)
    }

    pub(crate) fn send_request(&self, method: &str, data: Value) -> Result<PendingHandle> {
        let request_id = self.registry.next_request_id();
        let handle = self.registry.register(request_id.clone(), method);
        if let Err(e) = self.post(EnvelopeBusMessage::request(method, request_id.as_str(), data)) {
            self.registry.forget(&request_id);
            return Err(e);
        }
        self.track_pending();
        Ok(handle)
    }

    pub(crate) fn track_pending(&self) {
        self.metrics
            .pending_requests
            .set(&[], self.registry.pending_count() as i64);
    }

    fn is_addressed_to_us(&self, msg: &EnvelopeBusMessage) -> bool {
        let Some(target) = msg.target_endpoint_id.as_deref() else {
            return true;
        };
        match self.role {
            Role::Channel => target == self.id,
            Role::Envelope => {
                // A (re)loaded host starts a new connection with its own id.
                if msg.purpose == Purpose::Request && msg.msg_type == INIT_REQUEST {
                    return true;
                }
                self.connection_id().map_or(true, |id| id == target)
            }
        }
    }

    fn on_event(self: &Arc<Self>, ev: RawEvent) {
        let Some(msg) = self.adapter.accept(&ev) else {
            return;
        };
        if !self.is_addressed_to_us(&msg) {
            tracing::debug!(
                endpoint = %self.id,
                target = ?msg.target_endpoint_id,
                "dropping message addressed to another connection"
            );
            self.metrics
                .messages_dropped
                .inc(&[("reason", "foreign_target")]);
            return;
        }
        self.dispatch(msg, &ev.origin);
    }

    fn dispatch(self: &Arc<Self>, msg: EnvelopeBusMessage, origin: &str) {
        let purpose = msg.purpose;
        match purpose {
            Purpose::Request => {
                let this = Arc::clone(self);
                tokio::spawn(async move { this.answer(msg).await });
            }
            Purpose::Response => self.settle(msg, origin),
            Purpose::Notification => {
                let data = msg.data.unwrap_or(Value::Null);
                let n = self.notifications.emit(&msg.msg_type, &data);
                tracing::trace!(endpoint = %self.id, method = %msg.msg_type, listeners = n, "notification delivered");
            }
            Purpose::SharedValueUpdate => {
                let data = msg.data.unwrap_or(Value::Null);
                self.shared.apply(&msg.msg_type, data);
            }
            Purpose::SharedValueGetDefault => {
                if let Some(v) = self.shared.default_answer(&msg.msg_type) {
                    if let Err(e) = self.post(EnvelopeBusMessage::shared_value_update(&msg.msg_type, v)) {
                        tracing::debug!(endpoint = %self.id, error = %e, "shared default not sent");
                    }
                }
            }
        }
    }

    fn settle(&self, msg: EnvelopeBusMessage, origin: &str) {
        let Some(request_id) = msg.request_id.clone() else {
            return;
        };
        let method = msg.msg_type.clone();
        let outcome = msg.into_outcome();
        if self.role == Role::Channel && method == INIT_REQUEST && self.registry.is_pending(&request_id) {
            if let Ok(data) = &outcome {
                self.accept_envelope(origin, data);
            }
        }
        let settled = match outcome {
            Ok(data) => self.registry.resolve(&request_id, data),
            Err(remote) => self.registry.reject(&request_id, BusError::from_remote(remote)),
        };
        if let Some(elapsed) = settled {
            self.metrics
                .request_duration
                .observe(&[("method", method.as_str())], elapsed);
        }
        self.track_pending();
    }

    async fn answer(self: Arc<Self>, msg: EnvelopeBusMessage) {
        let Some(request_id) = msg.request_id.clone() else {
            return;
        };
        let method = msg.msg_type.clone();

        let outcome = if self.role == Role::Envelope && method == INIT_REQUEST {
            self.answer_init(msg.data.as_ref()).await
        } else {
            self.invoke(&method, msg.data.unwrap_or(Value::Null)).await
        };

        let reply = match outcome {
            Ok(data) => EnvelopeBusMessage::response_ok(method.as_str(), request_id.as_str(), data),
            Err(e) => {
                tracing::debug!(endpoint = %self.id, method = %method, request_id = %request_id, error = %e, "request failed");
                self.metrics
                    .handler_errors
                    .inc(&[("method", method.as_str())]);
                match EnvelopeBusMessage::response_err(method.as_str(), request_id.as_str(), &e.to_remote()) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(endpoint = %self.id, error = %e, "error response not encodable");
                        return;
                    }
                }
            }
        };

        if let Err(e) = self.post(reply) {
            tracing::debug!(endpoint = %self.id, request_id = %request_id, error = %e, "response not sent");
        }
    }

    /// Channel side: the answered init request tells us where the envelope
    /// lives. Recorded before the pending init is resolved.
    fn accept_envelope(&self, origin: &str, data: &Value) {
        let endpoint_id = data
            .get("envelopeId")
            .and_then(Value::as_str)
            .map(str::to_owned);
        self.narrow_origin(origin);
        if let Ok(mut peer) = self.peer.write() {
            *peer = Some(PeerInfo {
                endpoint_id,
                origin: origin.to_string(),
            });
        }
    }

    fn narrow_origin(&self, origin: &str) {
        if self.adapter.narrow_to(origin) {
            tracing::debug!(endpoint = %self.id, origin, "target origin pinned to peer");
        } else {
            tracing::warn!(endpoint = %self.id, origin, "peer origin outside configured target origin, not pinned");
        }
    }

    async fn invoke(&self, method: &str, args: Value) -> Result<Value> {
        let handlers = self.local.get().cloned().ok_or(BusError::NotReady)?;
        let name = method.to_string();
        tokio::spawn(async move { handlers.dispatch(&name, args).await })
            .await
            .map_err(|e| BusError::Internal(format!("handler task failed: {e}")))?
    }

    /// Envelope side of the handshake. Every init request (retries
    /// included) is answered once the local implementation exists.
    async fn answer_init(&self, data: Option<&Value>) -> Result<Value> {
        let (req, ctx) = decode_init(data)?;
        let initializer = self
            .initializer
            .clone()
            .ok_or_else(|| BusError::Internal("envelope without initializer".into()))?;

        if let Ok(mut peer) = self.peer.write() {
            *peer = Some(PeerInfo {
                endpoint_id: Some(req.envelope_server_id.clone()),
                origin: req.origin.clone(),
            });
        }
        if let Ok(mut stored) = self.init_context.write() {
            stored.get_or_insert_with(|| ctx.clone());
        }

        self.local
            .get_or_try_init(|| async move { initializer.initialize(ctx).await.map(Arc::new) })
            .await?;

        self.narrow_origin(&req.origin);
        if self.lifecycle.mark_connected() {
            tracing::info!(endpoint = %self.id, peer = %req.envelope_server_id, origin = %req.origin, "envelope connected");
        }
        Ok(serde_json::json!({ "envelopeId": self.id }))
    }

    fn spawn_tracked(&self, task: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
    }

    fn dispose(&self) -> bool {
        if !self.lifecycle.mark_disposed() {
            return false;
        }
        if let Ok(mut tasks) = self.tasks.lock() {
            for t in tasks.drain(..) {
                t.abort();
            }
        }
        let abandoned = self.registry.abandon_all(BusError::Disposed);
        self.track_pending();
        tracing::info!(endpoint = %self.id, role = ?self.role, abandoned, "endpoint disposed");
        true
    }
}

impl Drop for EndpointInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn run_inbound(ep: Weak<EndpointInner>, mut inbound: Inbound) {
    while let Some(ev) = inbound.recv().await {
        let Some(inner) = ep.upgrade() else {
            break;
        };
        if inner.lifecycle.is_disposed() {
            break;
        }
        inner.on_event(ev);
    }
    tracing::debug!("inbound listener detached");
}

/// One side of the bus. Cheap to clone; all clones share state.
///
/// Constructors spawn tasks and must run inside a tokio runtime.
#[derive(Clone)]
pub struct BusEndpoint {
    inner: Arc<EndpointInner>,
}

impl BusEndpoint {
    /// Build the host side and start polling the envelope.
    pub fn channel(opts: ChannelOptions, port: Arc<dyn PostMessage>, inbound: Inbound) -> Result<Self> {
        let inner = Arc::new(EndpointInner::new(
            Role::Channel,
            port,
            opts.target_origin,
            Some(opts.local),
            None,
            opts.remote,
        ));

        let payload = encode_init(
            &InitRequest {
                origin: opts.origin,
                envelope_server_id: inner.id.clone(),
            },
            &opts.init_context,
        )?;

        inner.spawn_tracked(tokio::spawn(run_inbound(Arc::downgrade(&inner), inbound)));
        inner.spawn_tracked(tokio::spawn(poll_init(
            Arc::downgrade(&inner),
            payload,
            opts.retry,
        )));

        tracing::info!(endpoint = %inner.id, remote = %inner.remote.name(), "channel endpoint created");
        Ok(Self { inner })
    }

    /// Build the embedded side; it waits for the channel's init request.
    pub fn envelope(opts: EnvelopeOptions, port: Arc<dyn PostMessage>, inbound: Inbound) -> Self {
        let inner = Arc::new(EndpointInner::new(
            Role::Envelope,
            port,
            opts.target_origin,
            None,
            Some(opts.initializer),
            opts.remote,
        ));
        inner.spawn_tracked(tokio::spawn(run_inbound(Arc::downgrade(&inner), inbound)));

        tracing::info!(endpoint = %inner.id, remote = %inner.remote.name(), "envelope endpoint created");
        Self { inner }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.inner.lifecycle.watch()
    }

    /// Resolve once `CONNECTED`; fails on disposal or exhausted retries.
    pub async fn wait_connected(&self) -> Result<()> {
        self.inner.lifecycle.wait_connected().await
    }

    pub fn requests(&self) -> Requests {
        Requests::new(Arc::clone(&self.inner))
    }

    pub fn notifications(&self) -> Notifications {
        Notifications::new(Arc::clone(&self.inner))
    }

    pub fn shared(&self) -> SharedValues {
        SharedValues::new(Arc::clone(&self.inner))
    }

    /// The other side, once the handshake told us who it is.
    pub fn peer(&self) -> Option<PeerInfo> {
        self.inner.peer()
    }

    /// Context received with the handshake (envelope side).
    pub fn init_context(&self) -> Option<InitContext> {
        self.inner.init_context.read().ok().and_then(|c| c.clone())
    }

    /// Whether the local implementation is in place.
    pub fn is_ready(&self) -> bool {
        self.inner.local.initialized()
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.registry.pending_count()
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.inner.metrics
    }

    /// Tear down: detach listeners, reject pending requests, stop sending.
    /// Returns false if already disposed.
    pub fn dispose(&self) -> bool {
        self.inner.dispose()
    }
}
