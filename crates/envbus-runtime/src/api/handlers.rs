use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use envbus_core::error::{BusError, Result};

use super::contract::RequestMethod;

/// One request handler. Implement directly for stateful handlers, or use
/// [`RequestHandlers::on`] with a closure.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value>;
}

struct FnHandler<A, R, F> {
    f: F,
    _marker: PhantomData<fn(A) -> R>,
}

#[async_trait]
impl<A, R, F, Fut> RequestHandler for FnHandler<A, R, F>
where
    A: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send,
{
    async fn handle(&self, args: Value) -> Result<Value> {
        let args: A = serde_json::from_value(args)
            .map_err(|e| BusError::Codec(format!("invalid arguments: {e}")))?;
        let out = (self.f)(args).await?;
        Ok(serde_json::to_value(out)?)
    }
}

/// Local implementation of a capability: method name -> handler.
#[derive(Default)]
pub struct RequestHandlers {
    handlers: DashMap<String, Arc<dyn RequestHandler>>,
}

impl RequestHandlers {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register(&self, name: &str, handler: Arc<dyn RequestHandler>) {
        if self.handlers.insert(name.to_string(), handler).is_some() {
            tracing::warn!(method = name, "request handler replaced");
        }
    }

    /// Register a typed async closure for `method`.
    pub fn on<A, R, F, Fut>(&self, method: &RequestMethod<A, R>, f: F) -> &Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        self.register(
            method.name(),
            Arc::new(FnHandler {
                f,
                _marker: PhantomData,
            }),
        );
        self
    }

    pub async fn dispatch(&self, name: &str, args: Value) -> Result<Value> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| BusError::MethodNotFound(name.to_string()))?
            .value()
            .clone();
        handler.handle(args).await
    }
}
