use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::api::listeners::{Listener, ListenerSet, Subscription};

/// Local replica of shared values.
///
/// - `values`: last value seen per name (local set or remote update)
/// - `defaults`: values this side provides to a peer asking for them
#[derive(Default)]
pub struct SharedValueStore {
    values: DashMap<String, Value>,
    defaults: DashMap<String, Value>,
    listeners: ListenerSet,
}

impl SharedValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(|v| v.value().clone())
    }

    /// Store `value` and notify every listener, even if unchanged.
    pub fn apply(&self, name: &str, value: Value) -> usize {
        self.values.insert(name.to_string(), value.clone());
        self.listeners.emit(name, &value)
    }

    pub fn provide_default(&self, name: &str, value: Value) {
        self.defaults.insert(name.to_string(), value);
    }

    pub fn is_provider(&self, name: &str) -> bool {
        self.defaults.contains_key(name)
    }

    /// What a provider answers to a default lookup: the current value,
    /// falling back to the default. `None` if this side does not provide `name`.
    pub fn default_answer(&self, name: &str) -> Option<Value> {
        if !self.is_provider(name) {
            return None;
        }
        self.get(name)
            .or_else(|| self.defaults.get(name).map(|v| v.value().clone()))
    }

    pub fn subscribe(&self, name: &str, listener: Listener) -> Subscription {
        self.listeners.subscribe(name, listener)
    }

    pub fn unsubscribe(&self, sub: &Subscription) -> bool {
        self.listeners.unsubscribe(sub)
    }

    /// Run `listener` once with the current value, if any.
    pub fn replay(&self, name: &str, listener: &Listener) -> bool {
        match self.get(name) {
            Some(v) => {
                let l = Arc::clone(listener);
                l(&v);
                true
            }
            None => false,
        }
    }
}
