//! Configuration module
//!
//! Handles loading listener and development server settings.

mod console;

pub use console::*;
