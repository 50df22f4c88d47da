//! Build command execution.
//!
//! - `runner`: `$KITTENS_*` variables and the async command runner shared by
//!   `kittens build` and the live-reload BuildActor

mod runner;

pub use runner::*;
