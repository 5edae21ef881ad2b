#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the building finder.
//!
//! Search results are printed to stdout as JSON; logs go to stderr and are
//! filtered with `RUST_LOG`.

use std::time::Duration;

use building_finder_buildings::BuildingFinder;
use building_finder_buildings_models::{BuildingQuery, SearchResult};
use building_finder_overpass::endpoints::{ENDPOINTS_ENV_VAR, all_endpoints, configured_endpoints};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "building_finder",
    about = "Find buildings by footprint size around a point"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a single radius around a point
    Search {
        /// Longitude of the search center
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Latitude of the search center
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Minimum footprint area in square feet
        #[arg(long, default_value = "0")]
        min_sqft: f64,
        /// Search radius in meters
        #[arg(long, default_value = "500")]
        radius: f64,
        /// Upstream request timeout in seconds
        #[arg(long, default_value = "180")]
        timeout: u64,
        /// Skip the result cache (neither read nor write)
        #[arg(long)]
        no_cache: bool,
    },
    /// Search a radius, splitting it into quadrants when it exceeds 2 km
    SearchLarge {
        /// Longitude of the search center
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Latitude of the search center
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Minimum footprint area in square feet
        #[arg(long, default_value = "0")]
        min_sqft: f64,
        /// Search radius in meters
        #[arg(long, default_value = "1000")]
        radius: f64,
    },
    /// Delete every cached search result
    ClearCache,
    /// List the configured Overpass endpoints
    Endpoints,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            lon,
            lat,
            min_sqft,
            radius,
            timeout,
            no_cache,
        } => {
            let finder = BuildingFinder::from_env()?;
            let query = BuildingQuery::new(lon, lat, min_sqft, radius);
            let result = finder
                .get_buildings_by_size(&query, Duration::from_secs(timeout), !no_cache)
                .await;
            print_result(&result)?;
        }
        Commands::SearchLarge {
            lon,
            lat,
            min_sqft,
            radius,
        } => {
            let finder = BuildingFinder::from_env()?;
            let result = finder.search_large_area(lon, lat, min_sqft, radius).await;
            print_result(&result)?;
        }
        Commands::ClearCache => {
            let finder = BuildingFinder::from_env()?;
            finder.clear_cache().await?;
            log::info!("Cleared cache at {}", finder.cache().dir().display());
        }
        Commands::Endpoints => {
            if std::env::var(ENDPOINTS_ENV_VAR).is_ok_and(|v| !v.trim().is_empty()) {
                println!("Overridden by {ENDPOINTS_ENV_VAR}:");
                for endpoint in configured_endpoints() {
                    println!("  {}", endpoint.url);
                }
                return Ok(());
            }

            println!("{:<20} {:<8} {:<8} URL", "ID", "PRIORITY", "ENABLED");
            println!("{}", "-".repeat(80));
            for endpoint in &all_endpoints() {
                println!(
                    "{:<20} {:<8} {:<8} {}",
                    endpoint.id, endpoint.priority, endpoint.enabled, endpoint.url
                );
            }
        }
    }

    Ok(())
}

fn print_result(result: &SearchResult) -> Result<(), serde_json::Error> {
    if let Some(error) = result.error_message() {
        log::error!("Search failed: {error}");
    } else if let Some(set) = result.buildings() {
        log::info!("Found {} building(s)", set.total_buildings);
    }
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
