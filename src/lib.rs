//! scenelink - bridge between a code editor and a live scene.
//!
//! The editor side runs a [`session::HostSession`], the scene side a
//! [`session::ClientSession`]; both talk through a [`bridge::Bridge`] over
//! any [`channel::Channel`].

pub mod bridge;
pub mod channel;
pub mod cli;
pub mod config;
pub mod core;
pub mod logger;
pub mod protocol;
pub mod resolve;
pub mod scene;
pub mod selection;
pub mod session;
pub mod transform;
