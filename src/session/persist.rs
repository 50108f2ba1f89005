//! Prop persistence boundary.
//!
//! Writing values back to source files is the editor's business; the host
//! session only needs the prior value to build undo entries.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::scene::Location;

/// Accepts final prop values for a call site.
pub trait PropPersistence: Send {
    /// Store `value` and return the value it replaced, if known.
    fn persist(&mut self, location: &Location, prop: &str, value: &Value) -> Option<Value>;
}

impl<P: PropPersistence> PropPersistence for Arc<Mutex<P>> {
    fn persist(&mut self, location: &Location, prop: &str, value: &Value) -> Option<Value> {
        self.lock().persist(location, prop, value)
    }
}

/// In-memory persistence keyed by call site and prop.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    values: FxHashMap<(Location, String), Value>,
    writes: usize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &Location, prop: &str) -> Option<&Value> {
        self.values.get(&(location.clone(), prop.to_owned()))
    }

    /// Total writes, including repeats of the same value.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl PropPersistence for MemoryPersistence {
    fn persist(&mut self, location: &Location, prop: &str, value: &Value) -> Option<Value> {
        self.writes += 1;
        self.values
            .insert((location.clone(), prop.to_owned()), value.clone())
    }
}
