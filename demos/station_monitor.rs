//! Station monitor
//!
//! Connects to every station in a JSON station list, logs their lifecycle
//! events and alarm notifications, and prints a health table every few
//! seconds. The list file is re-read on each tick, so editing it adds,
//! removes or re-addresses stations live.
//!
//! Run with: cargo run --example station_monitor [STATIONS_JSON]
//!
//! The file holds an array of stations:
//!
//! ```text
//! [
//!   { "name": "north", "ip": "10.0.0.1", "port": 9000 },
//!   { "name": "south", "ip": "10.0.0.2", "port": 9000 }
//! ]
//! ```
//!
//! Without a file, a single station on 127.0.0.1:9000 is used.

use std::path::{Path, PathBuf};
use std::time::Duration;

use station_link::{
    ConnectionConfig, EndpointDescriptor, EventHub, ManagerConfig, Payload, StationManager,
};

const REFRESH: Duration = Duration::from_secs(5);

fn load_stations(path: Option<&Path>) -> Result<Vec<EndpointDescriptor>, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(vec![EndpointDescriptor::new("local", "127.0.0.1", 9000)]),
    }
}

fn event_hub() -> EventHub {
    EventHub::builder()
        .on_connected(|id| tracing::info!(station = %id, "Connected"))
        .on_disconnected(|id, reason| tracing::warn!(station = %id, reason, "Disconnected"))
        .on_message(|id, payload| match payload {
            Payload::Json(value) => tracing::info!(station = %id, %value, "Notification"),
            other => tracing::info!(station = %id, bytes = other.len(), "Non-JSON frame"),
        })
        .on_error(|id, err| tracing::debug!(station = %id, error = %err, "Connection error"))
        .on_reconnect_failed(|id, attempts| {
            tracing::error!(station = %id, attempts, "Giving up until manual reconnect")
        })
        .on_closed(|id| tracing::info!(station = %id, "Closed"))
        .build()
}

async fn print_health(manager: &StationManager) {
    let stats = manager.stats().await;
    println!();
    println!(
        "{} stations: {} open, {} connecting, {} exhausted",
        stats.total, stats.open, stats.connecting, stats.exhausted
    );
    for health in manager.all_health().await {
        let uptime = health
            .uptime
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "-".to_owned());
        println!(
            "  {:<16} {:<13} retries={:<3} uptime={:<6} rx={:<6} {}",
            health.endpoint.as_str(),
            health.status,
            health.reconnect_count,
            uptime,
            health.frames_received,
            health.error.as_deref().unwrap_or("")
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path: Option<PathBuf> = std::env::args().nth(1).map(PathBuf::from);

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("station_link=info".parse()?)
                .add_directive("station_monitor=info".parse()?),
        )
        .init();

    let config = ManagerConfig::default().connection(ConnectionConfig::station_defaults());
    let manager = StationManager::with_config(config, event_hub());

    let stations = load_stations(path.as_deref())?;
    println!("Monitoring {} stations", stations.len());

    for report in station_link::probe_all(
        &stations,
        &station_link::JsonRpcSubscription::default(),
        Duration::from_secs(3),
    )
    .await
    {
        println!("probe {report}");
    }

    manager.reconcile(&stations).await;

    let mut ticker = tokio::time::interval(REFRESH);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match load_stations(path.as_deref()) {
                    Ok(stations) => {
                        let report = manager.reconcile(&stations).await;
                        for (id, err) in &report.failed {
                            eprintln!("{id}: {err}");
                        }
                    }
                    Err(e) => eprintln!("Failed to reload station list: {e}"),
                }
                print_health(&manager).await;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    manager.close_all().await;
    Ok(())
}
