use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Type-erased local listener.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    name: String,
    id: u64,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Listener set:
/// - `name -> [(subscription id, listener)...]` in subscription order
#[derive(Default)]
pub struct ListenerSet {
    map: DashMap<String, Vec<(u64, Listener)>>,
    seq: AtomicU64,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, name: &str, listener: Listener) -> Subscription {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.map
            .entry(name.to_string())
            .or_default()
            .push((id, listener));
        Subscription {
            name: name.to_string(),
            id,
        }
    }

    pub fn unsubscribe(&self, sub: &Subscription) -> bool {
        let Some(mut list) = self.map.get_mut(&sub.name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != sub.id);
        let removed = list.len() != before;
        if list.is_empty() {
            drop(list);
            self.map.remove_if(&sub.name, |_, l| l.is_empty());
        }
        removed
    }

    /// Invoke every listener of `name`. Returns how many ran.
    pub fn emit(&self, name: &str, value: &Value) -> usize {
        // Snapshot first: a listener may (un)subscribe while running.
        let listeners: Vec<Listener> = match self.map.get(name) {
            Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };
        for l in &listeners {
            l(value);
        }
        listeners.len()
    }
}

/// Wrap a typed callback; payloads that do not deserialize as `A` are
/// skipped (logged), never treated as protocol errors.
pub fn typed<A, F>(name: &'static str, f: F) -> Listener
where
    A: DeserializeOwned + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    Arc::new(move |v: &Value| match serde_json::from_value::<A>(v.clone()) {
        Ok(a) => f(a),
        Err(e) => tracing::debug!(name, error = %e, "listener skipped: payload does not match"),
    })
}
