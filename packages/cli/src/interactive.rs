//! Interactive menu for the fire portal CLI.
//!
//! Provides a menu-driven interface using `dialoguer` for running the
//! hotspot preview, cache maintenance, and the API server without
//! memorizing flags.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};
use fire_portal_cli_utils::MultiProgress;
use fire_portal_incident_models::{CategoryFilter, IncidentCategory, IncidentFilter, TimeWindow};
use fire_portal_pipeline::PipelineConfig;

use crate::commands::{self, HotspotOptions};

/// Top-level actions available in the interactive menu.
enum Action {
    Hotspots,
    Geocode,
    CacheStats,
    CacheClear,
    Server,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Hotspots,
        Self::Geocode,
        Self::CacheStats,
        Self::CacheClear,
        Self::Server,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Hotspots => "Preview incident hotspots",
            Self::Geocode => "Geocode an address",
            Self::CacheStats => "Show geocode cache stats",
            Self::CacheClear => "Clear geocode cache",
            Self::Server => "Start API server",
        }
    }
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected command fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Fire Portal");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Hotspots => commands::hotspots(prompt_hotspot_options()?, multi).await?,
        Action::Geocode => {
            let address: String = Input::new().with_prompt("Address").interact_text()?;
            commands::geocode(&address, false).await?;
        }
        Action::CacheStats => commands::cache_stats()?,
        Action::CacheClear => {
            let confirmed = Confirm::new()
                .with_prompt("Remove every cached address?")
                .default(false)
                .interact()?;
            if confirmed {
                commands::cache_clear()?;
            }
        }
        Action::Server => {
            // actix-web brings its own runtime; start it on a blocking
            // thread so the two runtimes don't nest.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(fire_portal_server::interactive::run())
            })
            .await??;
        }
    }

    Ok(())
}

fn prompt_hotspot_options() -> Result<HotspotOptions, Box<dyn std::error::Error>> {
    let incidents: String = Input::new()
        .with_prompt("Incidents JSON file")
        .interact_text()?;

    let department: String = Input::new()
        .with_prompt("Department address (empty to skip)")
        .allow_empty(true)
        .interact_text()?;

    let window_labels: Vec<&str> = TimeWindow::all().iter().map(|w| w.label()).collect();
    let window_idx = Select::new()
        .with_prompt("Time window")
        .items(&window_labels)
        .default(1)
        .interact()?;

    let mut category_labels = vec!["All categories"];
    category_labels.extend(IncidentCategory::all().iter().map(|c| c.label()));
    let category_idx = Select::new()
        .with_prompt("Category")
        .items(&category_labels)
        .default(0)
        .interact()?;
    let category = match category_idx {
        0 => CategoryFilter::All,
        i => CategoryFilter::Only(IncidentCategory::all()[i - 1]),
    };

    let mut config = PipelineConfig::default();

    let advanced = Confirm::new()
        .with_prompt("Configure advanced options?")
        .default(false)
        .interact()?;

    if advanced {
        let threshold: String = Input::new()
            .with_prompt("Cluster threshold (meters)")
            .default("250".to_string())
            .interact_text()?;
        config.cluster.threshold_meters = threshold.parse().unwrap_or(250.0);

        let max: String = Input::new()
            .with_prompt("Maximum incidents to geocode")
            .default("40".to_string())
            .interact_text()?;
        config.max_incidents = max.parse().unwrap_or(40);
    }

    let geojson: String = Input::new()
        .with_prompt("Write GeoJSON overlay to (empty to skip)")
        .allow_empty(true)
        .interact_text()?;

    Ok(HotspotOptions {
        incidents: PathBuf::from(incidents.trim()),
        department_address: Some(department.trim().to_string()).filter(|d| !d.is_empty()),
        filter: IncidentFilter {
            window: TimeWindow::all()[window_idx],
            category,
        },
        config,
        geojson: Some(geojson.trim()).filter(|p| !p.is_empty()).map(PathBuf::from),
        no_cache: false,
    })
}
