//! Typed callable surface over the remote capability set.
//!
//! `requests`, `notifications` and `shared` views of one endpoint. Each view
//! is a cheap handle (one `Arc`) and can be moved into tasks.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use envbus_core::error::{BusError, Result};
use envbus_core::protocol::EnvelopeBusMessage;

use crate::endpoint::EndpointInner;

use super::contract::{NotificationMethod, RequestMethod, SharedValue};
use super::listeners::{typed, Subscription};

/// Remote calls expecting a response.
#[derive(Clone)]
pub struct Requests {
    ep: Arc<EndpointInner>,
}

impl Requests {
    pub(crate) fn new(ep: Arc<EndpointInner>) -> Self {
        Self { ep }
    }

    /// Send `method` now and resolve with the remote answer.
    ///
    /// The request leaves as soon as this is called, before the returned
    /// future is polled. There is no timeout; race it against your own if
    /// needed. Only disposal settles it early.
    pub fn call<A, R>(&self, method: &RequestMethod<A, R>, args: A) -> impl Future<Output = Result<R>> + Send
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let sent = self.send(method.name(), args);
        async move {
            let value = sent?.wait().await?;
            Ok(serde_json::from_value(value)?)
        }
    }

    fn send<A: Serialize>(&self, name: &str, args: A) -> Result<crate::correlation::PendingHandle> {
        if !self.ep.remote.has_request(name) {
            return Err(BusError::NotInContract(name.to_string()));
        }
        let data = serde_json::to_value(args)?;
        self.ep.send_request(name, data)
    }
}

/// Fire-and-forget sends plus local multicast subscriptions.
#[derive(Clone)]
pub struct Notifications {
    ep: Arc<EndpointInner>,
}

impl Notifications {
    pub(crate) fn new(ep: Arc<EndpointInner>) -> Self {
        Self { ep }
    }

    pub fn send<A: Serialize>(&self, notification: &NotificationMethod<A>, args: A) -> Result<()> {
        let name = notification.name();
        if !self.ep.remote.has_notification(name) {
            return Err(BusError::NotInContract(name.to_string()));
        }
        let data = serde_json::to_value(args)?;
        self.ep.post(EnvelopeBusMessage::notification(name, data))
    }

    /// Listen for `notification` arriving from the peer or raised locally.
    pub fn subscribe<A, F>(&self, notification: &NotificationMethod<A>, f: F) -> Subscription
    where
        A: DeserializeOwned + 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        let name = notification.name();
        self.ep.notifications.subscribe(name, typed(name, f))
    }

    pub fn unsubscribe(&self, sub: &Subscription) -> bool {
        self.ep.notifications.unsubscribe(sub)
    }

    /// Fan out to local subscribers without touching the transport.
    pub fn emit_local<A: Serialize>(&self, notification: &NotificationMethod<A>, args: A) -> Result<usize> {
        let data = serde_json::to_value(args)?;
        Ok(self.ep.notifications.emit(notification.name(), &data))
    }
}

/// Replicated named values.
#[derive(Clone)]
pub struct SharedValues {
    ep: Arc<EndpointInner>,
}

impl SharedValues {
    pub(crate) fn new(ep: Arc<EndpointInner>) -> Self {
        Self { ep }
    }

    fn declared<T>(&self, value: &SharedValue<T>) -> Result<&'static str> {
        let name = value.name();
        if !self.ep.remote.has_shared(name) {
            return Err(BusError::NotInContract(name.to_string()));
        }
        Ok(name)
    }

    pub fn get<T: DeserializeOwned>(&self, value: &SharedValue<T>) -> Result<Option<T>> {
        match self.ep.shared.get(value.name()) {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Send the update, then store it locally and notify local listeners.
    pub fn set<T: Serialize>(&self, value: &SharedValue<T>, v: T) -> Result<()> {
        let name = self.declared(value)?;
        let data = serde_json::to_value(v)?;
        self.ep
            .post(EnvelopeBusMessage::shared_value_update(name, data.clone()))?;
        self.ep.shared.apply(name, data);
        Ok(())
    }

    /// Listen for updates. A known current value is replayed to the new
    /// listener right away; otherwise the peer is asked for its default.
    pub fn subscribe<T, F>(&self, value: &SharedValue<T>, f: F) -> Result<Subscription>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let name = self.declared(value)?;
        let listener = typed(name, f);
        let sub = self.ep.shared.subscribe(name, Arc::clone(&listener));
        if !self.ep.shared.replay(name, &listener) && !self.ep.shared.is_provider(name) {
            self.ep
                .post(EnvelopeBusMessage::shared_value_get_default(name))?;
        }
        Ok(sub)
    }

    pub fn unsubscribe(&self, sub: &Subscription) -> bool {
        self.ep.shared.unsubscribe(sub)
    }

    /// Answer the peer's default lookups for `value` (current value wins
    /// over `default` once one has been set).
    pub fn provide_default<T: Serialize>(&self, value: &SharedValue<T>, default: T) -> Result<()> {
        self.ep
            .shared
            .provide_default(value.name(), serde_json::to_value(default)?);
        Ok(())
    }
}
