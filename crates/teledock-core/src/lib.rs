#![deny(missing_docs)]
//! Teledock core library.
//!
//! Transport-agnostic pieces of the bot: the Docker runtime capability,
//! the resource model, text chunking, and shared configuration.

/// Configuration sources and shared constants.
pub mod config;
/// Docker runtime capability and resource model.
pub mod runtime;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
