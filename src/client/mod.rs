//! Console client module
//!
//! Derives the same-origin WebSocket endpoint for a host and logs every
//! message received on it.

mod endpoint;
mod listener;

pub use endpoint::*;
pub use listener::*;
