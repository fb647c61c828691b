//! Stream live updates for a route and its reroutes.
//!
//! Usage:
//!   cargo run -p flightpath-cli --bin watch_route -- --route <id>

use anyhow::Result;
use clap::Parser;
use flightpath_cli::PlannerClient;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Print WebSocket updates for a route")]
struct Args {
    /// Planning server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(long)]
    route: Uuid,

    /// Print raw JSON messages
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = PlannerClient::new(args.url);

    let route = client.route(args.route).await?;
    println!(
        "Watching {} ({} -> {} via {})",
        route.id, route.origin.code, route.destination.code, route.path_type
    );

    let mut stream = client.watch(args.route).await?;
    while let Some(update) = stream.next_update().await? {
        if args.raw {
            println!("{}", update);
            continue;
        }
        match update["type"].as_str() {
            Some("route_update") => println!(
                "Route {} replaced {} ({})",
                update["route_id"].as_str().unwrap_or("?"),
                update["previous_route_id"].as_str().unwrap_or("-"),
                update["route"]["path_type"].as_str().unwrap_or("?")
            ),
            Some("waypoint_status") => println!(
                "Waypoint #{} {} is now {}",
                update["sequence"],
                update["waypoint_id"].as_str().unwrap_or("?"),
                update["status"].as_str().unwrap_or("?")
            ),
            _ => println!("{}", update),
        }
    }

    println!("Stream closed");
    Ok(())
}
