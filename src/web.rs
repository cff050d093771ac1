#![cfg(not(tarpaulin_include))]

use claim_lookup::app;
use claim_lookup::config::{CacheConfig, ServerConfig};

/// Main entry point for the customer lookup web front end
///
/// Logging follows `RUST_LOG` (default `info`). Paths, timeout and listen
/// address come from the environment, see [`CacheConfig::from_vars`] and
/// [`ServerConfig::from_vars`].
///
/// # Arguments
/// * None. `CLAIMS_SOURCE_FILE`, `CLAIMS_SNAPSHOT_FILE`,
///   `CLAIMS_LOAD_TIMEOUT_SECS`, `HOST` and `PORT` are read from the environment
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    app::run(CacheConfig::from_env(), ServerConfig::from_env()).await
}
