//! Bridge - Typed Event Bus over a Channel
//!
//! Pub-sub plus correlated request/response between the editor host and the
//! scene client.
//!
//! ```text
//!        host                                    client
//!  send ──▶ gate ──(queued until ready)──▶ channel ──▶ pump ──▶ handlers
//!  request ──▶ pending[id] ◀──────── reply{id} ◀──────────────── Reply(v)
//! ```
//!
//! # Module Structure
//!
//! - `envelope` - wire envelope
//! - `handlers` - handler chain, `Subscription`, `compose`
//! - `reply` - pending resolvers and the `Reply` future
//!
//! # Readiness
//!
//! A gated endpoint (the host) queues every outbound command until the
//! remote sends `ready`, then flushes the queue once, in order. The gate
//! never re-closes until [`Bridge::reconnect`].
//!
//! Locks are released before handlers run, so a handler may send.

pub mod envelope;
pub mod handlers;
pub mod reply;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::channel::{Channel, ChannelError};
use crate::protocol::{Message, MessageKind, PROTOCOL_VERSION, Ready};
use crate::{debug, log};

pub use envelope::Envelope;
pub use handlers::{Dispatch, Handler, Subscription, compose};
pub use reply::Reply;

use handlers::{HandlerRegistry, run_chain};
use reply::PendingReplies;

/// Bridge failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("payload could not be serialized")]
    Serialize(#[source] serde_json::Error),

    #[error("reply payload did not match the expected type")]
    Deserialize(#[source] serde_json::Error),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The request was dropped by a reconnect or teardown.
    #[error("bridge disconnected before a reply arrived")]
    Disconnected,

    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

/// Which side of the bridge this endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The editor. Gated until the scene announces readiness.
    Host,
    /// The scene runtime. Open from the start.
    Client,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Client => "client",
        }
    }
}

/// Outbound readiness gate with its FIFO queue.
struct Gate {
    gated: bool,
    open: bool,
    queue: VecDeque<String>,
}

impl Gate {
    fn new(gated: bool) -> Self {
        Self {
            gated,
            open: !gated,
            queue: VecDeque::new(),
        }
    }

    fn reset(&mut self) {
        self.open = !self.gated;
        self.queue.clear();
    }
}

struct State {
    channel: Box<dyn Channel>,
    gate: Gate,
    pending: PendingReplies,
}

impl State {
    /// Post now if the gate is open, else queue.
    fn transmit(&mut self, frame: String) -> Result<(), ChannelError> {
        if self.gate.open {
            self.channel.post(frame)
        } else {
            self.gate.queue.push_back(frame);
            Ok(())
        }
    }

    /// Open the gate and flush the queue. Returns the number flushed, or
    /// `None` when the gate was already open.
    fn open_gate(&mut self) -> Result<Option<usize>, ChannelError> {
        if self.gate.open {
            return Ok(None);
        }
        self.gate.open = true;
        let mut flushed = 0;
        while let Some(frame) = self.gate.queue.pop_front() {
            if let Err(e) = self.channel.post(frame) {
                self.gate.queue.clear();
                return Err(e);
            }
            flushed += 1;
        }
        Ok(Some(flushed))
    }
}

struct Inner {
    role: Role,
    state: Mutex<State>,
    handlers: Mutex<HandlerRegistry>,
}

/// One endpoint of the bridge. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    /// Endpoint with the role's default gating (host gated, client open).
    pub fn new(role: Role, channel: impl Channel) -> Self {
        Self::with_gate(role, channel, role == Role::Host)
    }

    pub fn with_gate(role: Role, channel: impl Channel, gated: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                role,
                state: Mutex::new(State {
                    channel: Box::new(channel),
                    gate: Gate::new(gated),
                    pending: PendingReplies::default(),
                }),
                handlers: Mutex::new(HandlerRegistry::default()),
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Whether outbound commands are transmitted right away.
    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().gate.open
    }

    /// Commands waiting for the gate to open.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().gate.queue.len()
    }

    /// Requests still waiting for a reply.
    pub fn pending_replies(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Fire-and-forget. Serialization errors surface here, synchronously.
    pub fn send(&self, kind: MessageKind, payload: &impl Serialize) -> Result<(), BridgeError> {
        let payload = serde_json::to_value(payload).map_err(BridgeError::Serialize)?;
        let frame = Envelope::event(kind, payload)
            .encode()
            .map_err(BridgeError::Serialize)?;
        self.inner.state.lock().transmit(frame)?;
        Ok(())
    }

    /// Send a request and get a future of its reply.
    pub fn request<T: DeserializeOwned>(
        &self,
        kind: MessageKind,
        payload: &impl Serialize,
    ) -> Result<Reply<T>, BridgeError> {
        let payload = serde_json::to_value(payload).map_err(BridgeError::Serialize)?;

        let mut state = self.inner.state.lock();
        let (id, rx) = state.pending.register(self.inner.role.as_str());
        let frame = match Envelope::request(kind, payload, id.clone()).encode() {
            Ok(frame) => frame,
            Err(e) => {
                state.pending.forget(&id);
                return Err(BridgeError::Serialize(e));
            }
        };
        if let Err(e) = state.transmit(frame) {
            state.pending.forget(&id);
            return Err(e.into());
        }
        Ok(Reply::new(rx))
    }

    pub fn send_msg<M: Message>(&self, message: &M) -> Result<(), BridgeError> {
        self.send(M::KIND, message)
    }

    pub fn request_msg<M: Message>(&self, message: &M) -> Result<Reply<M::Reply>, BridgeError> {
        self.request(M::KIND, message)
    }

    /// Tell the host this endpoint is ready. Bypasses the local gate.
    pub fn announce_ready(&self) -> Result<(), BridgeError> {
        let payload = serde_json::to_value(Ready::default()).map_err(BridgeError::Serialize)?;
        let frame = Envelope::event(MessageKind::Ready, payload)
            .encode()
            .map_err(BridgeError::Serialize)?;
        self.inner.state.lock().channel.post(frame)?;
        Ok(())
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register a raw handler for `kind`.
    pub fn on(
        &self,
        kind: MessageKind,
        handler: impl Fn(&Value) -> Dispatch + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.handlers.lock().add(kind, Arc::new(handler));
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.handlers.lock().remove(kind, id);
            }
        })
    }

    /// Register a typed handler. Payloads that do not parse as `M` are
    /// passed on to the next handler.
    pub fn on_msg<M, F>(&self, handler: F) -> Subscription
    where
        M: Message + 'static,
        F: Fn(M) -> Dispatch + Send + Sync + 'static,
    {
        self.on(M::KIND, move |payload| match serde_json::from_value::<M>(payload.clone()) {
            Ok(message) => handler(message),
            Err(e) => {
                debug!("bridge"; "malformed {} payload: {}", M::KIND, e);
                Dispatch::Pass
            }
        })
    }

    pub fn handler_count(&self, kind: MessageKind) -> usize {
        self.inner.handlers.lock().count(kind)
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Drain every frame available on the channel and dispatch it.
    ///
    /// Every drained frame is dispatched even when an earlier one fails.
    /// The first dispatch error is returned, then a close reported while
    /// draining.
    pub fn pump(&self) -> Result<usize, BridgeError> {
        let mut frames = Vec::new();
        let closed = {
            let mut state = self.inner.state.lock();
            loop {
                match state.channel.poll() {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => break None,
                    Err(e) => break Some(e),
                }
            }
        };

        let mut first_error = None;
        for frame in &frames {
            if let Err(e) = self.dispatch(frame) {
                log!("bridge"; "dispatch failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match (first_error, closed) {
            (Some(e), _) => Err(e),
            (None, Some(e)) => Err(e.into()),
            (None, None) => Ok(frames.len()),
        }
    }

    /// Dispatch one inbound frame.
    ///
    /// Handlers run even when flushing the gate on `ready` fails; that
    /// failure is returned afterwards.
    pub fn dispatch(&self, frame: &str) -> Result<(), BridgeError> {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("bridge"; "dropping malformed frame: {}", e);
                return Ok(());
            }
        };

        if envelope.reply {
            let id = envelope.correlation_id.unwrap_or_default();
            if !self.inner.state.lock().pending.resolve(&id, envelope.payload) {
                debug!("bridge"; "ignoring reply with unknown correlation id `{}`", id);
            }
            return Ok(());
        }

        let flushed = if envelope.kind == MessageKind::Ready {
            self.observe_ready(&envelope.payload)
        } else {
            Ok(())
        };

        let chain = self.inner.handlers.lock().snapshot(envelope.kind);
        let outcome = run_chain(&chain, &envelope.payload);
        flushed?;

        if let Some(id) = envelope.correlation_id {
            let answer = match outcome {
                Dispatch::Reply(value) => value,
                Dispatch::Handled => Value::Null,
                Dispatch::Pass => {
                    debug!("bridge"; "no handler answered {} ({})", envelope.kind, id);
                    return Ok(());
                }
            };
            let frame = Envelope::response(envelope.kind, answer, id)
                .encode()
                .map_err(BridgeError::Serialize)?;
            // Replies answer a live remote; they never wait on the gate
            self.inner.state.lock().channel.post(frame)?;
        }
        Ok(())
    }

    fn observe_ready(&self, payload: &Value) -> Result<(), BridgeError> {
        match serde_json::from_value::<Ready>(payload.clone()) {
            Ok(ready) if ready.version != PROTOCOL_VERSION => {
                log!("bridge"; "remote speaks protocol v{}, expected v{}", ready.version, PROTOCOL_VERSION);
            }
            Ok(_) => {}
            Err(_) => debug!("bridge"; "ready without version"),
        }

        if let Some(flushed) = self.inner.state.lock().open_gate()? {
            debug!("bridge"; "remote ready, flushed {} queued frame(s)", flushed);
        }
        Ok(())
    }

    /// Async pump loop. Returns `Ok` when the remote closes the channel.
    pub async fn run(&self, every: Duration) -> Result<(), BridgeError> {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.pump() {
                Ok(_) => {}
                Err(BridgeError::Channel(ChannelError::Closed)) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    // =========================================================================
    // Reconnect
    // =========================================================================

    /// Swap in a fresh channel after the remote was torn down.
    ///
    /// Re-closes the gate of a gated endpoint, drops queued commands and
    /// fails every pending request with `Disconnected`. Handlers stay.
    pub fn reconnect(&self, channel: impl Channel) {
        let mut state = self.inner.state.lock();
        state.channel = Box::new(channel);
        state.gate.reset();
        state.pending.clear();
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Bridge")
            .field("role", &self.inner.role)
            .field("ready", &state.gate.open)
            .field("queued", &state.gate.queue.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}
