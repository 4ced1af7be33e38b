//! View layer for bot UI components
//!
//! Contains texts and HTML formatting for container listings and results.

pub mod container;

pub use container::*;
