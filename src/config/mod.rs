use std::path::PathBuf;

use rocket::figment::{
    providers::{Env, Format, Toml},
    Figment, Profile,
};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_QUALITY: u8 = 90;
pub const DEFAULT_CACHE_DIR: &str = "./cache";
pub const DEFAULT_CACHE_CLEAR_KEY: &str = "defaultKey";
pub const DEFAULT_SOURCE_DIR: &str = ".";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Extract(#[from] rocket::figment::Error),

    #[error("Quality must be between 0 and 100, got {0}")]
    QualityOutOfRange(u8),

    #[error("Error creating cache folder {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub address: String,
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_cache_clear_key")]
    pub cache_clear_key: String,
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_cache_clear_key() -> String {
    DEFAULT_CACHE_CLEAR_KEY.to_string()
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_DIR)
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config = figment.extract::<AppConfig>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality > 100 {
            return Err(ConfigError::QualityOutOfRange(self.quality));
        }
        Ok(())
    }

    pub fn uses_default_clear_key(&self) -> bool {
        self.cache_clear_key == DEFAULT_CACHE_CLEAR_KEY
    }
}

/// Rocket defaults, then `App.toml`, then `APP_*` environment variables.
pub fn figment() -> Figment {
    Figment::from(rocket::Config::default())
        .merge(Toml::file("App.toml").nested())
        .merge(Env::prefixed("APP_").ignore(&["PROFILE"]).global())
        .select(Profile::from_env_or("APP_PROFILE", "default"))
}
