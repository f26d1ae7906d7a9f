pub mod types;
pub mod error;
pub mod config;
pub mod data;
pub mod topology;
pub mod projection;
pub mod scale;
pub mod join;
pub mod legend;
pub mod tooltip;
pub mod render;
pub mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the datasets and write the map SVG and HTML page
    Generate {
        /// Defaults to ./config.toml when present, built-in settings otherwise
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Serve the map with an interactive tooltip
    Serve {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            let app_config = config::AppConfig::resolve(config.as_deref())?;

            // 1. Load Data (both sources in parallel)
            let map_data = data::load_data(&app_config).await.context("Failed to load map data")?;

            // 2. Scale, join, legend and layers
            let map = render::ChoroplethMap::build(&map_data)?;

            // 3. Write artifacts
            render::write_outputs(&app_config, &map)?;

            info!("Generation complete!");
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::resolve(config.as_deref())?;

            let map_data = data::load_data(&app_config).await.context("Failed to load map data")?;
            let map = render::ChoroplethMap::build(&map_data)?;

            server::start_server(app_config, map).await?;
        }
    }

    Ok(())
}
