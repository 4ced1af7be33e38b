/// Callback token codec and the callback router
pub mod callback;
/// Static command table and command-line parsing
pub mod commands;
/// Command handlers and the admin gate
pub mod handlers;
/// Inline selection menus built from container listings
pub mod menu;
/// Resilient delivery with bounded retry and chunk pacing
pub mod resilient;
/// Transport capability and its Telegram implementation
pub mod transport;
/// Unauthorized access log throttling
pub mod unauthorized_cache;
/// View layer for UI texts and formatted listings
pub mod views;

pub use unauthorized_cache::UnauthorizedCache;
