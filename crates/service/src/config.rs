//! Configuration loading.

use anyhow::Context;
use depot_core::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::path::Path;

/// Environment variable prefix. Nested keys are separated by `__`,
/// e.g. `DEPOT_MIRROR__REGISTRY_TIMEOUT_SECS`.
pub const ENV_PREFIX: &str = "DEPOT_";

/// Load configuration from an optional TOML file overlaid with environment
/// variables, then validate it.
pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
        }
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}
