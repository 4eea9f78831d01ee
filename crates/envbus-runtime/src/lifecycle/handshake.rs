//! Handshake: channel-side init polling and the envelope initializer seam.
//!
//! The channel re-issues the init request (with a fresh request id each time)
//! every `interval` until one is answered successfully. Each retry forgets the
//! previous attempt, so the registry never holds more than one init id and
//! late answers to superseded attempts are unknown-id no-ops.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::time::MissedTickBehavior;

use envbus_core::error::{BusError, Result};
use envbus_core::protocol::{InitContext, INIT_REQUEST};

use crate::api::RequestHandlers;
use crate::endpoint::EndpointInner;

use super::LifecycleState;

/// How the channel retries the init request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` retries until disposal.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_millis(100))
    }
}

impl RetryPolicy {
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    fn allows(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }
}

/// Builds the envelope's local implementation once the init context is known.
///
/// Runs at most once per endpoint on success; a failed run is retried on the
/// next init request.
#[async_trait]
pub trait EnvelopeInitializer: Send + Sync {
    async fn initialize(&self, ctx: InitContext) -> Result<RequestHandlers>;
}

struct FnInitializer<F>(F);

#[async_trait]
impl<F, Fut> EnvelopeInitializer for FnInitializer<F>
where
    F: Fn(InitContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RequestHandlers>> + Send,
{
    async fn initialize(&self, ctx: InitContext) -> Result<RequestHandlers> {
        (self.0)(ctx).await
    }
}

/// Wrap an async closure as an initializer.
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn EnvelopeInitializer>
where
    F: Fn(InitContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RequestHandlers>> + Send + 'static,
{
    Arc::new(FnInitializer(f))
}

/// Channel-side init polling loop.
///
/// Holds only a weak reference between ticks so a dropped endpoint ends the
/// loop on its own. At most one init request is pending at any time.
pub(crate) async fn poll_init(ep: Weak<EndpointInner>, payload: Value, policy: RetryPolicy) {
    let mut tick = tokio::time::interval(policy.interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut attempts: u32 = 0;
    let mut current: Option<String> = None;
    let mut waiting = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let Some(ep) = ep.upgrade() else { return; };
                if ep.lifecycle.state() != LifecycleState::Connecting {
                    return;
                }

                // The new attempt replaces the previous one; a late answer
                // to it is then an unknown-id no-op.
                waiting.clear();
                if let Some(prev) = current.take() {
                    ep.registry.forget(&prev);
                    ep.track_pending();
                }

                if !policy.allows(attempts) {
                    tracing::warn!(endpoint = %ep.id, attempts, "handshake retries exhausted");
                    ep.lifecycle.mark_exhausted(attempts);
                    return;
                }

                attempts += 1;
                ep.metrics.handshake_attempts.inc(&[]);
                match ep.send_request(INIT_REQUEST, payload.clone()) {
                    Ok(handle) => {
                        tracing::debug!(endpoint = %ep.id, attempt = attempts, request_id = %handle.id(), "init request sent");
                        current = Some(handle.id().to_string());
                        waiting.push(handle.wait());
                    }
                    Err(BusError::Disposed) => return,
                    Err(e) => tracing::warn!(endpoint = %ep.id, error = %e, "init request not sent"),
                }
            }

            Some(outcome) = waiting.next(), if !waiting.is_empty() => {
                let Some(ep) = ep.upgrade() else { return; };
                current = None;
                match outcome {
                    Ok(_) => {
                        ep.track_pending();
                        if ep.lifecycle.mark_connected() {
                            tracing::info!(endpoint = %ep.id, attempts, peer = ?ep.peer(), "channel connected");
                        }
                        return;
                    }
                    Err(BusError::Disposed) => return,
                    Err(e) => {
                        tracing::debug!(endpoint = %ep.id, error = %e, "init attempt rejected, retrying");
                    }
                }
            }
        }
    }
}
