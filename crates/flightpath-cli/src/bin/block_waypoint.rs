//! Report a blocked waypoint and print the spliced route.
//!
//! Usage:
//!   cargo run -p flightpath-cli --bin block_waypoint -- --route <id> --waypoint <id> --lat 24.1 --lon 75.3

use anyhow::Result;
use clap::Parser;
use flightpath_cli::PlannerClient;
use flightpath_core::Coordinate;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Block a waypoint and reroute around it")]
struct Args {
    /// Planning server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(long)]
    route: Uuid,

    /// Waypoint to block
    #[arg(long)]
    waypoint: Uuid,

    /// Current aircraft latitude
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Current aircraft longitude
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Add fuel and weather risk terms to the new route's fitness
    #[arg(long)]
    fuel_aware: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = PlannerClient::new(args.url);

    let outcome = client
        .block(
            args.route,
            args.waypoint,
            Coordinate::new(args.lat, args.lon),
            args.fuel_aware,
        )
        .await?;

    let summary = &outcome.summary;
    println!("Rerouted {} -> {}", summary.previous_route_id, summary.route_id);
    println!(
        "Joined {} at waypoint {} ({:.1} km away), distance change {:+.1} km",
        summary.chosen_style, summary.join_index, summary.join_distance_km, summary.distance_delta_km
    );
    println!(
        "Fitness {:.4} -> {:.4}{}",
        summary.previous_fitness,
        summary.fitness,
        if summary.degraded_data { " (degraded data)" } else { "" }
    );
    if let Some(risk) = summary.weather_risk {
        println!("Fuel-aware: base {:.4}, weather risk {:.2}", summary.base_fitness, risk);
    }
    println!(
        "New route: {} waypoints, {} reroute(s) so far",
        outcome.route.waypoints.len(),
        outcome.route.reroute_history.len()
    );

    Ok(())
}
