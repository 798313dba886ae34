//! Layered configuration for `dg-search`
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - `dg-search.toml` in the working directory, or the `--config` file
//! - `DG_SEARCH__<SECTION>__<KEY>` environment variables (`.env` is honoured)

use anyhow::{anyhow, Context};
use config::{ConfigError, Environment, File};
use datagerry_search::SearchConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "DG_SEARCH";
pub const DEFAULT_CONFIG_FILE: &str = "dg-search.toml";

const ROTATIONS: [&str; 4] = ["daily", "hourly", "minutely", "never"];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for the search crates; `RUST_LOG` takes precedence
    pub level: String,
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: PathBuf,
    pub file_prefix: String,
    /// One of `daily`, `hourly`, `minutely`, `never`
    pub file_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
            file_enabled: false,
            file_directory: PathBuf::from("logs"),
            file_prefix: "dg-search".to_string(),
            file_rotation: "daily".to_string(),
        }
    }
}

impl Config {
    /// Load configuration, reading `.env` first.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_sources(path, ENV_PREFIX)
    }

    fn from_sources(path: Option<&Path>, env_prefix: &str) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path.to_path_buf()).required(true)),
            None => {
                builder.add_source(File::from(PathBuf::from(DEFAULT_CONFIG_FILE)).required(false))
            }
        };

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let built = builder.build().map_err(|err| match err {
            ConfigError::Frozen => anyhow!("configuration builder is frozen"),
            other => anyhow::Error::from(other),
        })?;

        built
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !ROTATIONS.contains(&self.logging.file_rotation.as_str()) {
            return Err(anyhow!(
                "logging.file_rotation must be one of {}, got '{}'",
                ROTATIONS.join(", "),
                self.logging.file_rotation
            ));
        }
        if self.search.default_limit == 0 {
            return Err(anyhow!("search.default_limit must be greater than zero"));
        }
        Ok(())
    }
}
