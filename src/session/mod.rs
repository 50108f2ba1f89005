//! Sessions
//!
//! A session is one side of the editor/scene pair wired to its bridge:
//!
//! - `host` - editor side: mirrors focus and hover, owns history and the
//!   error overlay, persists final prop values
//! - `client` - scene side: owns the live tree, selection and transforms,
//!   answers host commands
//! - `persist` - where final prop values go
//!
//! Handlers never hold a session lock while sending; events are collected
//! under the lock and published after it is released.

pub mod client;
pub mod host;
pub mod persist;


pub use client::ClientSession;
pub use host::HostSession;
pub use persist::{MemoryPersistence, PropPersistence};
