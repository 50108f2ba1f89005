//! Handler chain and subscriptions.
//!
//! Handlers for one kind run in registration order. The first one that
//! returns `Handled` or `Reply` ends the chain, so a later-registered
//! default can be overridden by an earlier, more specific handler without
//! either knowing about the other.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;

use crate::protocol::MessageKind;

/// Outcome of one handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Not mine; keep going.
    Pass,
    /// Claimed; stop the chain. A request gets a `null` reply.
    Handled,
    /// Claimed with an answer for a request.
    Reply(Value),
}

impl Dispatch {
    /// Serialize `value` as a reply. A value that cannot be serialized
    /// still claims the message and answers `null`.
    pub fn reply<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Self::Reply(value),
            Err(e) => {
                crate::log!("bridge"; "reply not serializable: {}", e);
                Self::Handled
            }
        }
    }

    #[inline]
    pub fn is_claimed(&self) -> bool {
        !matches!(self, Self::Pass)
    }
}

pub type Handler = Arc<dyn Fn(&Value) -> Dispatch + Send + Sync>;

/// Handlers grouped by kind, each with a removal id.
#[derive(Default)]
pub(super) struct HandlerRegistry {
    next_id: u64,
    by_kind: FxHashMap<MessageKind, Vec<(u64, Handler)>>,
}

impl HandlerRegistry {
    pub fn add(&mut self, kind: MessageKind, handler: Handler) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.by_kind.entry(kind).or_default().push((id, handler));
        id
    }

    pub fn remove(&mut self, kind: MessageKind, id: u64) -> bool {
        let Some(handlers) = self.by_kind.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.by_kind.remove(&kind);
        }
        removed
    }

    /// Copy of the chain for `kind`, so it can run with no lock held.
    pub fn snapshot(&self, kind: MessageKind) -> Vec<Handler> {
        self.by_kind
            .get(&kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }
}

/// Run a chain until a handler claims the payload.
pub(super) fn run_chain(chain: &[Handler], payload: &Value) -> Dispatch {
    for handler in chain {
        let outcome = handler(payload);
        if outcome.is_claimed() {
            return outcome;
        }
    }
    Dispatch::Pass
}

/// Handle that removes one or more handlers.
///
/// Dropping it leaves the handlers registered; call [`Subscription::unsubscribe`].
pub struct Subscription {
    cancels: Vec<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(super) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancels: vec![Box::new(cancel)],
        }
    }

    /// A subscription that removes nothing.
    pub fn empty() -> Self {
        Self {
            cancels: Vec::new(),
        }
    }

    /// Remove every handler this subscription covers.
    pub fn unsubscribe(self) {
        for cancel in self.cancels {
            cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.cancels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cancels.is_empty()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handlers", &self.cancels.len())
            .finish()
    }
}

/// Merge subscriptions so one `unsubscribe` tears all of them down.
pub fn compose(subscriptions: impl IntoIterator<Item = Subscription>) -> Subscription {
    Subscription {
        cancels: subscriptions
            .into_iter()
            .flat_map(|s| s.cancels)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn handler(outcome: Dispatch, log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Handler {
        let log = Arc::clone(log);
        Arc::new(move |_: &Value| {
            log.lock().push(name);
            outcome.clone()
        })
    }

    #[test]
    fn test_chain_stops_at_first_claim() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![
            handler(Dispatch::Pass, &log, "a"),
            handler(Dispatch::Handled, &log, "b"),
            handler(Dispatch::Handled, &log, "c"),
        ];

        assert_eq!(run_chain(&chain, &Value::Null), Dispatch::Handled);
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_chain_all_pass() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![handler(Dispatch::Pass, &log, "a"), handler(Dispatch::Pass, &log, "b")];

        assert_eq!(run_chain(&chain, &Value::Null), Dispatch::Pass);
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_registry_remove() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::default();
        let a = registry.add(MessageKind::Ready, handler(Dispatch::Pass, &log, "a"));
        let _b = registry.add(MessageKind::Ready, handler(Dispatch::Pass, &log, "b"));

        assert!(registry.remove(MessageKind::Ready, a));
        assert!(!registry.remove(MessageKind::Ready, a));
        assert_eq!(registry.count(MessageKind::Ready), 1);
        assert!(!registry.remove(MessageKind::Error, a));
    }

    #[test]
    fn test_compose_runs_every_cancel() {
        let hits = Arc::new(Mutex::new(0));
        let make = || {
            let hits = Arc::clone(&hits);
            Subscription::new(move || *hits.lock() += 1)
        };

        let all = compose([make(), make(), Subscription::empty(), make()]);
        assert_eq!(all.len(), 3);
        all.unsubscribe();
        assert_eq!(*hits.lock(), 3);
    }
}
