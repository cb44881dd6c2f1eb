//! Configuration Loader
//!
//! Layered loading with the `config` crate: the environment preset first,
//! then an optional configuration file, then `INDEXED_CACHE__*` variables.

use super::indexed_cache_config::{detect_environment, IndexedCacheConfig};
use crate::constants::ENV_PREFIX;
use crate::error::Result;
use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

/// Loads [`IndexedCacheConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load for the detected environment, with environment variable overrides
    pub fn load(file: Option<&Path>) -> Result<IndexedCacheConfig> {
        Self::load_for_environment(file, &detect_environment(), true)
    }

    /// Load for an explicit environment; `with_env_overrides` controls the
    /// `INDEXED_CACHE__*` layer so tests can stay independent of process state
    pub fn load_for_environment(
        file: Option<&Path>,
        environment: &str,
        with_env_overrides: bool,
    ) -> Result<IndexedCacheConfig> {
        let preset = IndexedCacheConfig::for_environment(environment);
        let mut builder = Config::builder().add_source(Config::try_from(&preset)?);

        if let Some(path) = file {
            debug!(path = %path.display(), "Loading indexed cache configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        if with_env_overrides {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: IndexedCacheConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            environment = %environment,
            config = %serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string()),
            "Indexed cache configuration loaded"
        );
        Ok(config)
    }
}
