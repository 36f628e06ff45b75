mod app;
mod certwatch;
mod config;
mod directory;
mod domain;
mod engine;
mod geo;
mod history;
mod infrastructure;
mod notify;
mod tasks;

use anyhow::Result;
use infrastructure::{directories, instance_guard::InstanceGuard, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.storage)?;
    logging::init_tracing(&config, &paths)?;

    let _guard = InstanceGuard::acquire(&paths)?;

    let shutdown = shutdown::Shutdown::new();
    shutdown.install_signal_handlers();

    let app = app::WardenApp::initialize(config, paths, shutdown).await?;
    app.run().await
}
