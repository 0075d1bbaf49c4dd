use dotenv::dotenv;
use env_logger::Env;
use log::info;

use webpcache::config::{self, AppConfig};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load config
    let figment = config::figment();
    info!("Configuration loaded successfully");

    let rocket = webpcache::build(figment)?;

    if let Some(config) = rocket.state::<AppConfig>() {
        info!("Starting webpcache server on {}:{}", config.address, config.port);
    }

    let _ = rocket.launch().await?;
    Ok(())
}
