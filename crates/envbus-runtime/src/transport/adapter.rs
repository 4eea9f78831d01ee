//! Transport adapter: serialize-once send, validate-then-decode receive.
//!
//! Origin validation here is the only authentication boundary of the bus.
//! Frames failing it never reach dispatch. A wildcard target is narrowed to
//! the peer's origin once the handshake has told us who the peer is.

use std::sync::{Arc, RwLock};

use envbus_core::error::{BusError, Result};
use envbus_core::protocol::message::{decode, encode};
use envbus_core::protocol::{EnvelopeBusMessage, TargetOrigin};

use crate::obs::BusMetrics;

use super::{PostMessage, RawEvent};

pub struct TransportAdapter {
    port: Arc<dyn PostMessage>,
    target_origin: RwLock<TargetOrigin>,
    metrics: Arc<BusMetrics>,
}

impl TransportAdapter {
    pub fn new(port: Arc<dyn PostMessage>, target_origin: TargetOrigin, metrics: Arc<BusMetrics>) -> Self {
        Self {
            port,
            target_origin: RwLock::new(target_origin),
            metrics,
        }
    }

    fn current_target(&self) -> TargetOrigin {
        self.target_origin
            .read()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Pin the target to `origin`. Refused (false) when the current filter
    /// would not accept `origin` in the first place.
    pub fn narrow_to(&self, origin: &str) -> bool {
        let Ok(mut target) = self.target_origin.write() else {
            return false;
        };
        if !target.accepts(origin) {
            return false;
        }
        *target = TargetOrigin::parse(origin);
        true
    }

    pub fn send(&self, msg: &EnvelopeBusMessage) -> Result<()> {
        let data = encode(msg)?;
        self.port.post_message(data, &self.current_target())?;
        self.metrics
            .messages_sent
            .inc(&[("purpose", msg.purpose.as_str())]);
        Ok(())
    }

    /// Validate origin, then decode.
    pub fn check(&self, ev: &RawEvent) -> Result<EnvelopeBusMessage> {
        let target = self.current_target();
        if !target.accepts(&ev.origin) {
            return Err(BusError::OriginMismatch {
                expected: target.to_string(),
                actual: ev.origin.clone(),
            });
        }
        decode(&ev.data)
    }

    /// `check`, with drops logged and counted instead of returned.
    pub fn accept(&self, ev: &RawEvent) -> Option<EnvelopeBusMessage> {
        match self.check(ev) {
            Ok(msg) => {
                self.metrics
                    .messages_received
                    .inc(&[("purpose", msg.purpose.as_str())]);
                Some(msg)
            }
            Err(e @ BusError::OriginMismatch { .. }) => {
                tracing::debug!(error = %e, "dropping message from unexpected origin");
                self.metrics.messages_dropped.inc(&[("reason", "origin")]);
                None
            }
            Err(e) => {
                tracing::warn!(origin = %ev.origin, error = %e, "dropping malformed message");
                self.metrics.messages_dropped.inc(&[("reason", "malformed")]);
                None
            }
        }
    }
}
