use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::watch;

use envbus_core::error::{BusError, Result};

/// Endpoint lifecycle. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Connecting,
    Connected,
    Disposed,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Connecting => "CONNECTING",
            LifecycleState::Connected => "CONNECTED",
            LifecycleState::Disposed => "DISPOSED",
        }
    }
}

/// Observable lifecycle cell.
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
    // 0 while the handshake may still succeed.
    exhausted_after: AtomicU32,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Connecting);
        Self {
            tx,
            exhausted_after: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == LifecycleState::Disposed
    }

    pub fn watch(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// `CONNECTING -> CONNECTED`. Returns false if the state was anything else.
    pub fn mark_connected(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == LifecycleState::Connecting {
                *s = LifecycleState::Connected;
                true
            } else {
                false
            }
        })
    }

    /// Any state -> `DISPOSED`. Returns false if already disposed.
    pub fn mark_disposed(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == LifecycleState::Disposed {
                false
            } else {
                *s = LifecycleState::Disposed;
                true
            }
        })
    }

    /// Record that the handshake gave up and wake waiters.
    pub fn mark_exhausted(&self, attempts: u32) {
        self.exhausted_after.store(attempts.max(1), Ordering::Release);
        self.tx.send_modify(|_| {});
    }

    pub async fn wait_connected(&self) -> Result<()> {
        let mut rx = self.tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                LifecycleState::Connected => return Ok(()),
                LifecycleState::Disposed => return Err(BusError::Disposed),
                LifecycleState::Connecting => {
                    let attempts = self.exhausted_after.load(Ordering::Acquire);
                    if attempts > 0 {
                        return Err(BusError::HandshakeExhausted { attempts });
                    }
                }
            }
            if rx.changed().await.is_err() {
                return Err(BusError::Disposed);
            }
        }
    }
}
