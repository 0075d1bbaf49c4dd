#[macro_use]
extern crate rocket;

pub mod api;
pub mod cache;
pub mod config;
pub mod images;

use rocket::{figment::Figment, Build, Rocket};

use cache::DiskCache;
use config::{AppConfig, ConfigError};
use images::ImagePipeline;

/// Builds the Rocket instance from a fully merged figment.
///
/// Validates the configuration and creates the cache root before any request
/// can be served.
pub fn build(figment: Figment) -> Result<Rocket<Build>, ConfigError> {
    let config = AppConfig::from_figment(&figment)?;

    if config.uses_default_clear_key() {
        log::warn!("Using the default cache clear key, set APP_CACHE_CLEAR_KEY to override it");
    }

    std::fs::create_dir_all(&config.cache_dir).map_err(|source| ConfigError::CacheDir {
        path: config.cache_dir.clone(),
        source,
    })?;

    let cache = DiskCache::new(config.cache_dir.clone());
    let pipeline = ImagePipeline::new(cache.clone(), config.source_dir.clone(), config.quality);
    log::info!(
        "Serving images from {} with WebP quality {}, cache in {}",
        config.source_dir.display(),
        config.quality,
        config.cache_dir.display()
    );

    Ok(rocket::custom(figment)
        .manage(cache)
        .manage(pipeline)
        .manage(config)
        .mount("/", api::routes()))
}
