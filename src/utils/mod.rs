//! Utility modules shared by the dev server and the reload endpoint.

pub mod mime;
pub mod net;
