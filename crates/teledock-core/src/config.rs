//! Configuration sources and shared constants
//!
//! Settings are layered from optional config files and `TELEDOCK_*`
//! environment variables. Transport crates deserialize their own settings
//! struct from [`build_config`].

use config::{Config, ConfigError, Environment, File};

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "TELEDOCK";

/// Label set by `docker compose` on every container of a project.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Grace period given to a container before it is killed on stop.
pub const STOP_TIMEOUT_SECS: i32 = 30;

/// Number of log lines returned when no valid tail is requested.
pub const DEFAULT_LOG_TAIL: u64 = 10;

/// Length of the id prefix embedded into callback data.
///
/// Telegram limits callback data to 64 bytes.
pub const RESOURCE_ID_PREFIX_LEN: usize = 10;

/// Length of the id shown in container listings.
pub const RESOURCE_ID_DISPLAY_LEN: usize = 12;

/// Maximum characters of raw payload per outbound message chunk.
///
/// Telegram's hard limit is 4096; the margin leaves room for markup and escaping.
pub const MESSAGE_CHUNK_CHARS: usize = 3000;

/// Build the layered configuration.
///
/// Sources, later ones overriding earlier ones:
/// `config/default`, `config/{RUN_MODE}`, `config/local`, then `TELEDOCK_*`
/// environment variables (`TELEDOCK_TOKEN` becomes the `token` key).
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).ignore_empty(true))
        .build()
}
