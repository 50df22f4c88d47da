//! Actor System for Live Reload
//!
//! Message-passing concurrency for serve mode:
//!
//! ```text
//! FsActor --> BuildActor --> WsActor
//! (watch)     (rebuild)     (broadcast)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `build` - External build runner
//! - `ws` - WebSocket broadcast
//! - `coordinator` - Wires up and runs actors

pub mod build;
pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod ws;

pub use coordinator::{LiveReload, LiveReloadHandle};
