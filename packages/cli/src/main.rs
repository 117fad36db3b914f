#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the department hotspot preview.
//!
//! Runs the geocode-and-cluster pipeline over a JSON incident export,
//! looks up single addresses, and maintains the persistent geocode cache.
//! Without a subcommand it falls back to an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`fire_portal_cli_utils::init_logger`])
//! so that log lines and progress bars never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fire_portal_hotspots::ClusterConfig;
use fire_portal_incident_models::{CategoryFilter, IncidentFilter, TimeWindow};
use fire_portal_pipeline::PipelineConfig;

use crate::commands::HotspotOptions;

#[derive(Parser)]
#[command(name = "fire_portal", about = "Fire department incident hotspot tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Geocode incidents and group them into hotspots
    Hotspots {
        /// JSON file holding an array of incident records
        #[arg(long)]
        incidents: PathBuf,
        /// Department address used to center the map
        #[arg(long)]
        department_address: Option<String>,
        /// Time window (`last_7_days`, `last_30_days`, `last_90_days`,
        /// `last_year`, `all_time`)
        #[arg(long, default_value = "last_30_days")]
        window: TimeWindow,
        /// Category filter (`all`, `fire`, `ems`, `hazmat`, `service`,
        /// `false_alarm`, `other`)
        #[arg(long, default_value = "all")]
        category: CategoryFilter,
        /// Clustering distance threshold in meters
        #[arg(long, default_value = "250")]
        threshold: f64,
        /// Maximum number of incidents to geocode
        #[arg(long, default_value = "40")]
        max_incidents: usize,
        /// Write the pin/hotspot overlay as `GeoJSON` to this file
        #[arg(long)]
        geojson: Option<PathBuf>,
        /// Skip the persistent geocode cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Geocode a single address
    Geocode {
        /// Free-text address
        address: String,
        /// Skip the persistent geocode cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Inspect or clear the persistent geocode cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show the cache location and entry count
    Stats,
    /// Remove every cached address
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = fire_portal_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Hotspots {
            incidents,
            department_address,
            window,
            category,
            threshold,
            max_incidents,
            geojson,
            no_cache,
        } => {
            let options = HotspotOptions {
                incidents,
                department_address,
                filter: IncidentFilter { window, category },
                config: pipeline_config(threshold, max_incidents),
                geojson,
                no_cache,
            };
            commands::hotspots(options, &multi).await?;
        }
        Commands::Geocode { address, no_cache } => commands::geocode(&address, no_cache).await?,
        Commands::Cache { action } => match action {
            CacheAction::Stats => commands::cache_stats()?,
            CacheAction::Clear => commands::cache_clear()?,
        },
    }

    Ok(())
}

fn pipeline_config(threshold: f64, max_incidents: usize) -> PipelineConfig {
    PipelineConfig {
        max_incidents,
        request_delay: Duration::from_millis(100),
        cluster: ClusterConfig {
            threshold_meters: threshold,
            ..ClusterConfig::default()
        },
    }
}
