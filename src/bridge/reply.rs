//! Pending replies.
//!
//! Each request registers a one-shot resolver under its correlation id.
//! Replies are matched by id only; arrival order across requests carries no
//! meaning.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use super::BridgeError;

/// Resolvers waiting for a reply, keyed by correlation id.
#[derive(Default)]
pub(super) struct PendingReplies {
    next: u64,
    waiting: FxHashMap<String, oneshot::Sender<Value>>,
}

impl PendingReplies {
    /// Register a resolver under a fresh id prefixed with `origin`.
    pub fn register(&mut self, origin: &str) -> (String, oneshot::Receiver<Value>) {
        let id = format!("{origin}-{}", self.next);
        self.next += 1;
        let (tx, rx) = oneshot::channel();
        self.waiting.insert(id.clone(), tx);
        (id, rx)
    }

    pub fn forget(&mut self, id: &str) {
        self.waiting.remove(id);
    }

    /// Deliver a reply. Returns `false` for an unknown id.
    ///
    /// A requester that dropped its future still counts as known: the
    /// resolver existed, the value just has nowhere to go.
    pub fn resolve(&mut self, id: &str, value: Value) -> bool {
        match self.waiting.remove(id) {
            Some(tx) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Drop every resolver; their futures yield `Disconnected`.
    pub fn clear(&mut self) {
        self.waiting.clear();
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }
}

/// Future of a reply payload.
///
/// No timeout by default: a remote that never answers leaves this pending.
/// Use [`Reply::with_timeout`] to bound the wait.
#[must_use = "a reply does nothing unless awaited"]
pub struct Reply<T> {
    rx: oneshot::Receiver<Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Reply<T> {
    pub(super) fn new(rx: oneshot::Receiver<Value>) -> Self {
        Self {
            rx,
            _marker: PhantomData,
        }
    }

    /// Wait at most `limit` for the reply.
    pub async fn with_timeout(self, limit: Duration) -> Result<T, BridgeError> {
        tokio::time::timeout(limit, self)
            .await
            .map_err(|_| BridgeError::Timeout(limit))?
    }
}

impl<T: DeserializeOwned> Future for Reply<T> {
    type Output = Result<T, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(value)) => {
                Poll::Ready(serde_json::from_value(value).map_err(BridgeError::Deserialize))
            }
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::Disconnected)),
            Poll::Pending => Poll::Pending,
        }
    }
}
