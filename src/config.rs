//! Configuration for the METAR map
//!
//! Loads settings from a TOML file layered with `METARMAP_`-prefixed
//! environment variables and validates them. All configuration values are
//! immutable once the map is running.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveTime, Utc};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use sunrise::{Coordinates, SolarDay, SolarEvent};
use tracing::warn;

use crate::color::RgbColor;
use crate::error::MetarMapError;
use crate::metar::FlightCategory;

/// Root configuration structure for the METAR map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetarMapConfig {
    /// Weather dataserver and polling cadence
    #[serde(default)]
    pub source: SourceConfig,
    /// Color palette per flight category plus overlay colors
    #[serde(default)]
    pub colors: ColorConfig,
    /// Wind blink / gust animation settings
    #[serde(default)]
    pub wind: WindAnimationConfig,
    /// Lightning burst animation settings
    #[serde(default)]
    pub lightning: LightningAnimationConfig,
    /// Day/night dimming settings
    #[serde(default)]
    pub day_night: DayNightConfig,
    /// Render tick pacing for the host loop, in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Weather dataserver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the aviationweather.gov dataserver query
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds; bounds one poll iteration so stop
    /// requests are never starved by a hung fetch
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds between update attempts
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
    /// Seconds since the last successful update after which data is stale.
    /// Should be at least the update interval for staleness to behave
    /// sensibly; smaller values just mark every gap stale.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

/// Color palette for METAR conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorConfig {
    #[serde(default = "default_color_vfr")]
    pub vfr: RgbColor,
    #[serde(default = "default_color_vfr_fade")]
    pub vfr_fade: RgbColor,
    #[serde(default = "default_color_mvfr")]
    pub mvfr: RgbColor,
    #[serde(default = "default_color_mvfr_fade")]
    pub mvfr_fade: RgbColor,
    #[serde(default = "default_color_ifr")]
    pub ifr: RgbColor,
    #[serde(default = "default_color_ifr_fade")]
    pub ifr_fade: RgbColor,
    #[serde(default = "default_color_lifr")]
    pub lifr: RgbColor,
    #[serde(default = "default_color_lifr_fade")]
    pub lifr_fade: RgbColor,
    /// Neutral color rendered when no usable data exists for a station
    #[serde(default = "default_color_clear")]
    pub clear: RgbColor,
    #[serde(default = "default_color_lightning")]
    pub lightning: RgbColor,
    #[serde(default = "default_color_high_winds")]
    pub high_winds: RgbColor,
}

impl ColorConfig {
    /// Base color for a flight category
    #[must_use]
    pub fn base_color(&self, category: FlightCategory) -> RgbColor {
        match category {
            FlightCategory::Vfr => self.vfr,
            FlightCategory::Mvfr => self.mvfr,
            FlightCategory::Ifr => self.ifr,
            FlightCategory::Lifr => self.lifr,
        }
    }

    /// Fade variant of a base color: the configured fade when the color is a
    /// known category color, half intensity otherwise
    #[must_use]
    pub fn fade_of(&self, color: RgbColor) -> RgbColor {
        if color == self.vfr {
            self.vfr_fade
        } else if color == self.mvfr {
            self.mvfr_fade
        } else if color == self.ifr {
            self.ifr_fade
        } else if color == self.lifr {
            self.lifr_fade
        } else {
            color.faded()
        }
    }
}

/// Wind blink animation settings.
/// A `None` threshold disables that trigger (treated as unreachable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindAnimationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Wind speed (kt) above which the station blinks to the fade color
    #[serde(default = "default_blink_threshold")]
    pub blink_threshold_kt: Option<u32>,
    /// Wind or gust speed (kt) above which the station blinks the high-wind color
    #[serde(default = "default_gust_threshold")]
    pub gust_threshold_kt: Option<u32>,
    #[serde(default = "default_blink_cycle_min")]
    pub blink_cycle_min_secs: f64,
    #[serde(default = "default_blink_cycle_max")]
    pub blink_cycle_max_secs: f64,
    #[serde(default = "default_half")]
    pub blink_duty_cycle: f64,
    #[serde(default = "default_gust_cycle_min")]
    pub gust_cycle_min_secs: f64,
    #[serde(default = "default_gust_cycle_max")]
    pub gust_cycle_max_secs: f64,
    #[serde(default = "default_half")]
    pub gust_duty_cycle: f64,
}

/// Lightning burst animation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightningAnimationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Outer cycle bounds: long quiet periods between bursts
    #[serde(default = "default_lightning_cycle_min")]
    pub cycle_min_secs: f64,
    #[serde(default = "default_lightning_cycle_max")]
    pub cycle_max_secs: f64,
    #[serde(default = "default_lightning_cycle_duty")]
    pub cycle_duty_cycle: f64,
    /// Inner burst bounds: the rapid flicker within the active phase
    #[serde(default = "default_burst_min")]
    pub burst_min_secs: f64,
    #[serde(default = "default_burst_max")]
    pub burst_max_secs: f64,
    #[serde(default = "default_half")]
    pub burst_duty_cycle: f64,
}

/// Day/night dimming settings.
///
/// Either sunrise/sunset by coordinates or a fixed bright/dim clock window.
/// An incomplete combination makes the feature inactive; it is never a
/// construction error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DayNightConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Channel multiplier applied during the dim period, `0.0..=1.0`
    #[serde(default = "default_brightness_dim")]
    pub brightness_dim: f64,
    /// Compute the bright period from sunrise/sunset at the coordinates
    #[serde(default)]
    pub use_sunrise_sunset: bool,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Local clock time at which the bright period starts
    #[serde(default)]
    pub bright_time_start: Option<NaiveTime>,
    /// Local clock time at which the dim period starts
    #[serde(default)]
    pub dim_time_start: Option<NaiveTime>,
}

impl DayNightConfig {
    /// Whether the configuration is complete enough to act on
    #[must_use]
    pub fn valid(&self) -> bool {
        if !self.enabled {
            return false;
        }
        if self.use_sunrise_sunset {
            matches!((self.latitude, self.longitude), (Some(_), Some(_)))
        } else {
            self.bright_time_start.is_some() && self.dim_time_start.is_some()
        }
    }

    /// Resolve whether the dim period applies at `now`.
    /// Invalid or disabled configurations never dim.
    #[must_use]
    pub fn dim_active(&self, now: DateTime<Local>) -> bool {
        if !self.valid() {
            return false;
        }
        if self.use_sunrise_sunset {
            return self.outside_daylight(now.with_timezone(&Utc));
        }
        let (Some(bright), Some(dim)) = (self.bright_time_start, self.dim_time_start) else {
            return false;
        };
        let time = now.time();
        !(bright < time && time < dim)
    }

    fn outside_daylight(&self, now: DateTime<Utc>) -> bool {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return false;
        };
        let Some(coordinates) = Coordinates::new(latitude, longitude) else {
            warn!(latitude, longitude, "invalid day/night coordinates, not dimming");
            return false;
        };
        let solar_day = SolarDay::new(coordinates, now.date_naive());
        // Polar day/night has no sunrise or sunset; keep the lights bright,
        // matching the incomplete-configuration rule
        let (Some(sunrise), Some(sunset)) = (
            solar_day.event_time(SolarEvent::Sunrise),
            solar_day.event_time(SolarEvent::Sunset),
        ) else {
            return false;
        };
        !(sunrise < now && now < sunset)
    }
}

// Default value functions

fn default_base_url() -> String {
    concat!(
        "https://aviationweather.gov/cgi-bin/data/dataserver.php?",
        "datasource=metars&requestType=retrieve&format=xml&",
        "mostRecentForEachStation=constraint&hoursBeforeNow=24&"
    )
    .to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_update_interval_secs() -> u64 {
    900
}

fn default_stale_after_secs() -> u64 {
    5220
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_color_vfr() -> RgbColor {
    RgbColor::new(0, 255, 0)
}

fn default_color_vfr_fade() -> RgbColor {
    RgbColor::new(0, 125, 0)
}

fn default_color_mvfr() -> RgbColor {
    RgbColor::new(0, 0, 255)
}

fn default_color_mvfr_fade() -> RgbColor {
    RgbColor::new(0, 0, 125)
}

fn default_color_ifr() -> RgbColor {
    RgbColor::new(255, 0, 0)
}

fn default_color_ifr_fade() -> RgbColor {
    RgbColor::new(125, 0, 0)
}

fn default_color_lifr() -> RgbColor {
    RgbColor::new(255, 0, 255)
}

fn default_color_lifr_fade() -> RgbColor {
    RgbColor::new(125, 0, 125)
}

fn default_color_clear() -> RgbColor {
    RgbColor::new(0, 0, 0)
}

fn default_color_lightning() -> RgbColor {
    RgbColor::new(255, 255, 255)
}

fn default_color_high_winds() -> RgbColor {
    RgbColor::new(255, 255, 0)
}

fn default_true() -> bool {
    true
}

fn default_half() -> f64 {
    0.5
}

fn default_blink_threshold() -> Option<u32> {
    Some(15)
}

fn default_gust_threshold() -> Option<u32> {
    Some(25)
}

fn default_blink_cycle_min() -> f64 {
    1.0
}

fn default_blink_cycle_max() -> f64 {
    3.0
}

fn default_gust_cycle_min() -> f64 {
    0.5
}

fn default_gust_cycle_max() -> f64 {
    1.5
}

fn default_lightning_cycle_min() -> f64 {
    5.0
}

fn default_lightning_cycle_max() -> f64 {
    10.0
}

fn default_lightning_cycle_duty() -> f64 {
    0.2
}

fn default_burst_min() -> f64 {
    0.1
}

fn default_burst_max() -> f64 {
    0.15
}

fn default_brightness_dim() -> f64 {
    0.1
}

impl Default for MetarMapConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            colors: ColorConfig::default(),
            wind: WindAnimationConfig::default(),
            lightning: LightningAnimationConfig::default(),
            day_night: DayNightConfig::default(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            update_interval_secs: default_update_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            vfr: default_color_vfr(),
            vfr_fade: default_color_vfr_fade(),
            mvfr: default_color_mvfr(),
            mvfr_fade: default_color_mvfr_fade(),
            ifr: default_color_ifr(),
            ifr_fade: default_color_ifr_fade(),
            lifr: default_color_lifr(),
            lifr_fade: default_color_lifr_fade(),
            clear: default_color_clear(),
            lightning: default_color_lightning(),
            high_winds: default_color_high_winds(),
        }
    }
}

impl Default for WindAnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blink_threshold_kt: default_blink_threshold(),
            gust_threshold_kt: default_gust_threshold(),
            blink_cycle_min_secs: default_blink_cycle_min(),
            blink_cycle_max_secs: default_blink_cycle_max(),
            blink_duty_cycle: default_half(),
            gust_cycle_min_secs: default_gust_cycle_min(),
            gust_cycle_max_secs: default_gust_cycle_max(),
            gust_duty_cycle: default_half(),
        }
    }
}

impl Default for LightningAnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cycle_min_secs: default_lightning_cycle_min(),
            cycle_max_secs: default_lightning_cycle_max(),
            cycle_duty_cycle: default_lightning_cycle_duty(),
            burst_min_secs: default_burst_min(),
            burst_max_secs: default_burst_max(),
            burst_duty_cycle: default_half(),
        }
    }
}

impl MetarMapConfig {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from the specified path, layered with
    /// `METARMAP_`-prefixed environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::default_config_path().unwrap_or_else(|| PathBuf::from("metarmap.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("METARMAP")
                .separator("_")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: MetarMapConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Default configuration file path under the user config directory
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("metarmap").join("config.toml"))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.source.base_url.is_empty() {
            return Err(MetarMapError::config("source base URL cannot be empty").into());
        }
        if self.source.timeout_secs == 0 {
            return Err(MetarMapError::config("source timeout must be nonzero").into());
        }
        if self.source.update_interval_secs == 0 {
            return Err(MetarMapError::config("update interval must be nonzero").into());
        }
        if self.source.stale_after_secs < self.source.update_interval_secs {
            // Documented recommendation, not enforced
            warn!(
                stale_after_secs = self.source.stale_after_secs,
                update_interval_secs = self.source.update_interval_secs,
                "stale tolerance is below the update interval; data will go stale between polls"
            );
        }

        for (name, duty) in [
            ("wind.blink_duty_cycle", self.wind.blink_duty_cycle),
            ("wind.gust_duty_cycle", self.wind.gust_duty_cycle),
            ("lightning.cycle_duty_cycle", self.lightning.cycle_duty_cycle),
            ("lightning.burst_duty_cycle", self.lightning.burst_duty_cycle),
        ] {
            if !(0.0..=1.0).contains(&duty) {
                return Err(MetarMapError::config(format!(
                    "{name} must be between 0.0 and 1.0, got {duty}"
                ))
                .into());
            }
        }

        for (name, min, max) in [
            (
                "wind blink cycle",
                self.wind.blink_cycle_min_secs,
                self.wind.blink_cycle_max_secs,
            ),
            (
                "wind gust cycle",
                self.wind.gust_cycle_min_secs,
                self.wind.gust_cycle_max_secs,
            ),
            (
                "lightning cycle",
                self.lightning.cycle_min_secs,
                self.lightning.cycle_max_secs,
            ),
            (
                "lightning burst",
                self.lightning.burst_min_secs,
                self.lightning.burst_max_secs,
            ),
        ] {
            if min <= 0.0 || max < min {
                return Err(MetarMapError::config(format!(
                    "{name} durations must satisfy 0 < min <= max, got {min}..{max}"
                ))
                .into());
            }
        }

        if !(0.0..=1.0).contains(&self.day_night.brightness_dim) {
            return Err(MetarMapError::config(format!(
                "day_night.brightness_dim must be between 0.0 and 1.0, got {}",
                self.day_night.brightness_dim
            ))
            .into());
        }

        Ok(())
    }
}

/// Load the station→pixel map: one `STATION_ID,pixel_index` pair per line,
/// insertion order preserved.
pub fn load_station_map<P: AsRef<Path>>(path: P) -> Result<Vec<(String, usize)>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read station map: {}", path.display()))?;
    parse_station_map(&contents)
}

/// Parse station map file contents
pub fn parse_station_map(contents: &str) -> Result<Vec<(String, usize)>> {
    let mut map = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (station, index) = line.split_once(',').ok_or_else(|| {
            MetarMapError::config(format!("station map line {} has no comma: '{line}'", line_no + 1))
        })?;
        let pixel: usize = index.trim().parse().map_err(|_| {
            MetarMapError::config(format!(
                "station map line {} has an invalid pixel index: '{index}'",
                line_no + 1
            ))
        })?;
        map.push((station.trim().to_string(), pixel));
    }
    Ok(map)
}
