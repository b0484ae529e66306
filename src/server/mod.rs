//! Development server module
//!
//! Serves the page bundle and the `/ws` echo endpoint it connects to.

mod websocket;

pub use websocket::*;
