use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use metarmap::config::load_station_map;
use metarmap::led::LoggingLedDriver;
use metarmap::source::{AviationWeatherClient, SourcePoller};
use metarmap::{MainLoop, MetarMapConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (station_map_path, config_path) = parse_args()?;

    let config = MetarMapConfig::load_from_path(config_path)?;
    let station_map = load_station_map(&station_map_path)?;
    if station_map.is_empty() {
        bail!("station map {} contains no stations", station_map_path.display());
    }
    info!(
        stations = station_map.len(),
        map = %station_map_path.display(),
        "starting METAR map"
    );

    let stations: Vec<String> = station_map.iter().map(|(id, _)| id.clone()).collect();
    let client = AviationWeatherClient::new(&config.source, &stations)?;
    let poller = SourcePoller::new(
        client,
        Duration::from_secs(config.source.update_interval_secs),
        Duration::from_secs(config.source.stale_after_secs),
    );
    let source = poller.spawn()?;

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("shutdown requested");
        running_handler.store(false, Ordering::Relaxed);
    })
    .context("Failed to install the Ctrl-C handler")?;

    let mut main_loop = MainLoop::new(&config, &station_map, source, LoggingLedDriver::default());
    let tick = Duration::from_millis(config.tick_interval_ms);
    while running.load(Ordering::Relaxed) {
        main_loop.tick();
        thread::sleep(tick);
    }

    main_loop.close();
    info!("METAR map stopped");
    Ok(())
}

/// `metarmap <station-map.csv> [config.toml]`
fn parse_args() -> Result<(PathBuf, Option<PathBuf>)> {
    let mut args = env::args().skip(1);
    let Some(station_map) = args.next() else {
        bail!("usage: metarmap <station-map.csv> [config.toml]");
    };
    Ok((PathBuf::from(station_map), args.next().map(PathBuf::from)))
}
