//! Request a route plan and print the chosen route.
//!
//! Usage:
//!   cargo run -p flightpath-cli --bin plan_route -- --from DEL --to BOM --aircraft A320

use anyhow::Result;
use clap::Parser;
use flightpath_cli::{parse_exclusion, PlanParams, PlannerClient};
use flightpath_core::{ExcludedRegion, OptimizerKind, PathStyle};

#[derive(Parser, Debug)]
#[command(author, version, about = "Plan a route between two airports")]
struct Args {
    /// Planning server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Origin airport code
    #[arg(long)]
    from: String,

    /// Destination airport code
    #[arg(long)]
    to: String,

    #[arg(long, default_value = "A320")]
    aircraft: String,

    /// Optimization method: aco or genetic
    #[arg(long)]
    method: Option<OptimizerKind>,

    /// Candidate style, repeatable (all styles when omitted)
    #[arg(long = "style")]
    styles: Vec<PathStyle>,

    /// Excluded region as lat,lon,radius_km, repeatable
    #[arg(long = "exclude", value_parser = parse_exclusion_arg)]
    exclusions: Vec<ExcludedRegion>,

    #[arg(long)]
    seed: Option<u64>,

    /// Print every waypoint of the chosen route
    #[arg(long)]
    waypoints: bool,
}

fn parse_exclusion_arg(value: &str) -> Result<ExcludedRegion, String> {
    parse_exclusion(value).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = PlannerClient::new(args.url);

    let plan = client
        .plan(&PlanParams {
            origin: args.from,
            destination: args.to,
            aircraft: args.aircraft,
            method: args.method,
            styles: args.styles,
            exclusions: args.exclusions,
            seed: args.seed,
        })
        .await?;

    let best = &plan.best;
    println!("Route {}", best.id);
    println!(
        "{} -> {} via {} ({}, {} rounds, {} evaluations)",
        best.origin.code, best.destination.code, best.path_type, plan.method, plan.rounds, plan.evaluations
    );
    println!(
        "Distance {:.1} km, duration {:.0} min, fuel {:.0} L, fitness {:.4}",
        best.distance_km, best.duration_min, best.fuel_l, best.fitness
    );
    if plan.degraded_data {
        println!("Warning: scored with degraded weather data");
    }

    println!("Candidates:");
    for candidate in &plan.candidates {
        let marker = if candidate.path_type == best.path_type { "*" } else { " " };
        println!(
            " {} {:<8} {:>8.1} km  fitness {:.4}",
            marker, candidate.path_type, candidate.distance_km, candidate.fitness
        );
    }

    if args.waypoints {
        for wp in &best.waypoints {
            println!(
                "  #{:<3} {} {:.4}, {:.4} [{}]",
                wp.sequence, wp.id, wp.position.lat, wp.position.lon, wp.status
            );
        }
    }

    Ok(())
}
