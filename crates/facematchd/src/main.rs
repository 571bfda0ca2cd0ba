use anyhow::{Context, Result};
use facematch_fs::DirectorySource;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::Config;
use dbus_interface::{FaceMatchService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facematchd starting");

    let config = Config::load()?;
    let thresholds = config.thresholds();
    tracing::info!(
        reference_dir = %config.reference_dir.display(),
        match_threshold = thresholds.matched,
        possible_threshold = thresholds.possible,
        system_bus = config.system_bus,
        "configuration loaded"
    );

    let source =
        DirectorySource::new(&config.reference_dir).with_max_file_bytes(config.max_file_bytes);
    let engine = engine::spawn_engine(source, thresholds).context("starting engine")?;

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, FaceMatchService::new(engine))?
        .build()
        .await
        .context("registering on D-Bus")?;

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "facematchd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("facematchd shutting down");

    Ok(())
}
