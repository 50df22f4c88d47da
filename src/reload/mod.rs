//! Reload Module
//!
//! Browser-facing half of the live reload loop.
//!
//! ```text
//! BuildActor -> NotificationQueue -> WsActor -> ConnectionRegistry -> Browser
//! ```
//!
//! # Modules
//!
//! - `message` - Notification payload sent to browsers
//! - `queue` - Bounded queue between the build and the broadcaster
//! - `registry` - Live WebSocket connections
//! - `server` - WebSocket upgrade endpoint

pub mod message;
pub mod queue;
pub mod registry;
pub mod server;
