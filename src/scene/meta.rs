//! Source-location metadata attached to runtime nodes.
//!
//! A record names the call site that produced a node and carries the chain
//! of custom components between that node and the nearest ancestor node
//! with its own record:
//!
//! ```text
//! <Foo />            /scene.tsx:20:2   custom, no runtime node
//!   <mesh />         /scene.tsx:10:4   record { parents: [Foo] }
//! ```
//!
//! Records are immutable and shared through `Arc`. A re-render produces a
//! new record; consumers must re-read, never cache across renders.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One authored call site: `(path, line, column)`.
///
/// Negative line or column marks a sentinel (e.g. the scene root), not a
/// real source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub line: i32,
    pub column: i32,
}

impl Location {
    pub fn new(path: impl Into<String>, line: i32, column: i32) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }

    /// True when this points at real source (both coordinates non-negative).
    #[inline]
    pub fn is_source(&self) -> bool {
        self.line >= 0 && self.column >= 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

/// Metadata record attached to exactly one runtime node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneMeta {
    #[serde(flatten)]
    pub location: Location,
    /// Element or component name as authored (`mesh`, `Foo`).
    pub name: String,
    /// Enclosing custom component records, nearest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<Arc<SceneMeta>>,
}

impl SceneMeta {
    pub fn new(path: impl Into<String>, line: i32, column: i32, name: impl Into<String>) -> Self {
        Self {
            location: Location::new(path, line, column),
            name: name.into(),
            parents: Vec::new(),
        }
    }

    /// Sentinel record for nodes that exist at runtime but were not authored
    /// at a specific call site (scene roots, portals).
    pub fn sentinel(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(path, -1, -1, name)
    }

    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[inline]
    pub fn is_source(&self) -> bool {
        self.location.is_source()
    }

    /// True when this record or one of its parents sits at `location`.
    pub fn mentions(&self, location: &Location) -> bool {
        &self.location == location || self.parents.iter().any(|p| &p.location == location)
    }
}

/// Chain an enclosing custom component onto a child record.
///
/// `parents` is nearest-first, so the enclosing record lands after every
/// component already chained (it is further out). Returns a new record;
/// the input is never mutated.
pub fn chain_parent(child: &SceneMeta, enclosing: Arc<SceneMeta>) -> SceneMeta {
    let mut next = child.clone();
    next.parents.push(enclosing);
    next
}
