//! `metarmap` - Aviation weather on a map of LEDs
//!
//! This library polls METAR reports from the aviationweather.gov dataserver
//! and renders flight categories onto an addressable LED strip, with blink
//! overlays for wind, gusts and lightning, and day/night dimming.

pub mod animation;
pub mod color;
pub mod config;
pub mod error;
pub mod led;
pub mod main_loop;
pub mod metar;
pub mod parser;
pub mod source;
pub mod station;

// Re-export core types for public API
pub use animation::{BurstBlink, RandomBlink};
pub use color::RgbColor;
pub use config::{load_station_map, MetarMapConfig};
pub use error::MetarMapError;
pub use led::{LedDriver, LoggingLedDriver, MemoryLedDriver};
pub use main_loop::MainLoop;
pub use metar::{FlightCategory, Metar, WindDirection};
pub use parser::parse_metar_xml;
pub use source::{
    AviationWeatherClient, MetarSource, PollerHandle, Snapshot, SourcePoller, StaticSource,
};
pub use station::Station;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, MetarMapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
