//! Render loop
//!
//! Each tick turns the latest snapshot into per-station colors: category base
//! color, wind and lightning overlays, then day/night dimming. Only stations
//! whose computed color changed are pushed to the LED driver.

use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, info, trace};

use crate::animation::{BurstBlink, RandomBlink};
use crate::color::RgbColor;
use crate::config::{
    ColorConfig, DayNightConfig, LightningAnimationConfig, MetarMapConfig, WindAnimationConfig,
};
use crate::led::LedDriver;
use crate::metar::Metar;
use crate::source::{MetarSource, Snapshot};
use crate::station::Station;

/// Drives the LED map from a [`MetarSource`].
/// The driver is closed on drop if [`MainLoop::close`] was never called.
pub struct MainLoop<S, D: LedDriver> {
    source: S,
    driver: D,
    stations: Vec<Station>,
    colors: ColorConfig,
    wind: WindAnimationConfig,
    lightning: LightningAnimationConfig,
    day_night: DayNightConfig,
    /// Snapshot currently being rendered; replaced whole, never merged
    working: Option<Snapshot>,
    closed: bool,
}

impl<S: MetarSource, D: LedDriver> MainLoop<S, D> {
    pub fn new(
        config: &MetarMapConfig,
        station_map: &[(String, usize)],
        source: S,
        driver: D,
    ) -> Self {
        let stations = station_map
            .iter()
            .map(|(id, pixel)| Station::new(id.clone(), *pixel))
            .collect();
        Self {
            source,
            driver,
            stations,
            colors: config.colors.clone(),
            wind: config.wind.clone(),
            lightning: config.lightning.clone(),
            day_night: config.day_night.clone(),
            working: None,
            closed: false,
        }
    }

    /// Access the underlying source, e.g. to feed a [`StaticSource`]
    ///
    /// [`StaticSource`]: crate::source::StaticSource
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// One render tick at the current wall-clock time
    pub fn tick(&mut self) {
        self.tick_at(Local::now());
    }

    /// One render tick; `now` is used only for day/night dimming
    pub fn tick_at(&mut self, now: DateTime<Local>) {
        if !self.driver.is_valid() {
            trace!("LED driver not usable, skipping tick");
            return;
        }
        if self.source.new_data() || self.working.is_none() {
            self.working = self.source.live_data();
            self.source.clear_new_data();
            if let Some(snapshot) = &self.working {
                debug!(
                    stations = snapshot.reports.len(),
                    "rendering from new snapshot"
                );
            }
        }
        if self.source.data_is_stale() {
            self.working = None;
        }

        let dimmed = self.day_night.dim_active(now);
        let colors = &self.colors;
        let wind = &self.wind;
        let lightning = &self.lightning;

        let mut pushed = 0usize;
        for station in &mut self.stations {
            let Some(color) = station_color(
                station,
                self.working.as_ref(),
                colors,
                wind,
                lightning,
            ) else {
                continue;
            };
            let color = if dimmed {
                color.scaled(self.day_night.brightness_dim)
            } else {
                color
            };

            station.set_color(color);
            if station.is_dirty() {
                self.driver.update(station.pixel_index, color);
                station.mark_clean();
                pushed += 1;
            }
        }

        if pushed > 0 {
            debug!(pushed, "updated LEDs");
        }
    }
}

impl<S, D: LedDriver> MainLoop<S, D> {
    /// Release the LED driver. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.closed {
            info!("closing LED driver");
            self.driver.close();
            self.closed = true;
        }
    }

    #[cfg(test)]
    fn driver(&self) -> &D {
        &self.driver
    }
}

impl<S, D: LedDriver> Drop for MainLoop<S, D> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Compute the color a station should show, or `None` to leave it untouched
fn station_color(
    station: &mut Station,
    snapshot: Option<&Snapshot>,
    colors: &ColorConfig,
    wind: &WindAnimationConfig,
    lightning: &LightningAnimationConfig,
) -> Option<RgbColor> {
    let Some(snapshot) = snapshot else {
        // No usable data for anybody: neutral color, no animation
        station.clear_timers();
        return Some(colors.clear);
    };

    let Some(metar) = snapshot.reports.get(&station.id) else {
        // Station absent from the response: keep showing what it had
        trace!(station = %station.id, "no report in snapshot, retaining color");
        return None;
    };

    let Some(category) = metar.flight_category else {
        // Report without a category is unusable for rendering
        trace!(station = %station.id, "report has no flight category, skipping");
        return None;
    };

    let base = colors.base_color(category);
    let mut color = base;

    color = apply_wind(station, metar, base, color, colors, wind);
    color = apply_lightning(station, metar, color, colors, lightning);

    Some(color)
}

/// Wind overlay. The gust condition wins over the plain blink condition; on
/// the timer's up phase the overlay color replaces the category color.
fn apply_wind(
    station: &mut Station,
    metar: &Metar,
    base: RgbColor,
    color: RgbColor,
    colors: &ColorConfig,
    wind: &WindAnimationConfig,
) -> RgbColor {
    if !wind.enabled {
        station.wind_blink = None;
        station.high_wind_blink = None;
        return color;
    }

    let gusty = exceeds(metar.wind_speed_kt, wind.gust_threshold_kt)
        || exceeds(metar.wind_gust_kt, wind.gust_threshold_kt);
    let windy = exceeds(metar.wind_speed_kt, wind.blink_threshold_kt);

    if gusty {
        station.wind_blink = None;
        let timer = station.high_wind_blink.get_or_insert_with(|| {
            RandomBlink::new(
                Duration::from_secs_f64(wind.gust_cycle_min_secs),
                Duration::from_secs_f64(wind.gust_cycle_max_secs),
                wind.gust_duty_cycle,
            )
        });
        if timer.sample() {
            return colors.high_winds;
        }
    } else if windy {
        station.high_wind_blink = None;
        let timer = station.wind_blink.get_or_insert_with(|| {
            RandomBlink::new(
                Duration::from_secs_f64(wind.blink_cycle_min_secs),
                Duration::from_secs_f64(wind.blink_cycle_max_secs),
                wind.blink_duty_cycle,
            )
        });
        if timer.sample() {
            return colors.fade_of(base);
        }
    } else {
        station.wind_blink = None;
        station.high_wind_blink = None;
    }
    color
}

/// Lightning overlay, applied on top of whatever the wind overlay chose
fn apply_lightning(
    station: &mut Station,
    metar: &Metar,
    color: RgbColor,
    colors: &ColorConfig,
    lightning: &LightningAnimationConfig,
) -> RgbColor {
    if !lightning.enabled || !metar.lightning_reported() {
        station.lightning_blink = None;
        return color;
    }

    let timer = station.lightning_blink.get_or_insert_with(|| {
        BurstBlink::new(
            Duration::from_secs_f64(lightning.cycle_min_secs),
            Duration::from_secs_f64(lightning.cycle_max_secs),
            lightning.cycle_duty_cycle,
            Duration::from_secs_f64(lightning.burst_min_secs),
            Duration::from_secs_f64(lightning.burst_max_secs),
            lightning.burst_duty_cycle,
        )
    });
    if timer.sample() {
        colors.lightning
    } else {
        color
    }
}

fn exceeds(speed: Option<u32>, threshold: Option<u32>) -> bool {
    matches!((speed, threshold), (Some(speed), Some(threshold)) if speed > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::MemoryLedDriver;
    use crate::metar::FlightCategory;
    use crate::source::StaticSource;
    use std::collections::HashMap;

    fn quiet_config() -> MetarMapConfig {
        let mut config = MetarMapConfig::default();
        config.wind.enabled = false;
        config.lightning.enabled = false;
        config.day_night.enabled = false;
        config
    }

    fn vfr_metar(station: &str) -> Metar {
        let mut metar = Metar::new(station);
        metar.flight_category = Some(FlightCategory::Vfr);
        metar
    }

    fn station_map() -> Vec<(String, usize)> {
        vec![("KMSN".to_string(), 0), ("KOSH".to_string(), 1)]
    }

    #[test]
    fn test_category_colors_are_pushed_once() {
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), vfr_metar("KMSN"));
        let mut ifr = Metar::new("KOSH");
        ifr.flight_category = Some(FlightCategory::Ifr);
        reports.insert("KOSH".to_string(), ifr);

        let config = quiet_config();
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());

        main_loop.tick();
        let driver = main_loop.driver();
        assert_eq!(driver.pixel(0), Some(config.colors.vfr));
        assert_eq!(driver.pixel(1), Some(config.colors.ifr));
        assert_eq!(driver.update_count(), 2);
    }

    #[test]
    fn test_unchanged_colors_are_not_repushed() {
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), vfr_metar("KMSN"));

        let config = quiet_config();
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());

        main_loop.tick();
        let first = main_loop.driver().update_count();
        main_loop.tick();
        main_loop.tick();
        assert_eq!(main_loop.driver().update_count(), first);
    }

    #[test]
    fn test_missing_report_retains_prior_color() {
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), vfr_metar("KMSN"));
        reports.insert("KOSH".to_string(), vfr_metar("KOSH"));

        let config = quiet_config();
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.tick();

        // Next snapshot drops KOSH entirely
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), vfr_metar("KMSN"));
        main_loop.source.set_reports(reports);
        main_loop.tick();

        assert_eq!(main_loop.driver().pixel(1), Some(config.colors.vfr));
    }

    #[test]
    fn test_report_without_category_is_skipped() {
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), Metar::new("KMSN"));

        let config = quiet_config();
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.tick();

        assert_eq!(main_loop.driver().update_count(), 0);
    }

    #[test]
    fn test_stale_source_renders_clear_color() {
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), vfr_metar("KMSN"));

        let config = quiet_config();
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.tick();
        assert_eq!(main_loop.driver().pixel(0), Some(config.colors.vfr));

        main_loop.source.set_stale();
        main_loop.tick();
        assert_eq!(main_loop.driver().pixel(0), Some(config.colors.clear));
        assert_eq!(main_loop.driver().pixel(1), Some(config.colors.clear));
    }

    #[test]
    fn test_gust_condition_creates_high_wind_timer() {
        let mut metar = vfr_metar("KMSN");
        metar.wind_speed_kt = Some(30);
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), metar);

        let mut config = quiet_config();
        config.wind.enabled = true;
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.tick();

        let station = &main_loop.stations[0];
        assert!(station.high_wind_blink.is_some());
        assert!(station.wind_blink.is_none());
        // Whatever the timer phase, only two colors are possible
        let shown = main_loop.driver().pixel(0).unwrap();
        assert!(shown == config.colors.vfr || shown == config.colors.high_winds);
    }

    #[test]
    fn test_gust_field_alone_triggers_high_wind() {
        let mut metar = vfr_metar("KMSN");
        metar.wind_speed_kt = Some(5);
        metar.wind_gust_kt = Some(30);
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), metar);

        let mut config = quiet_config();
        config.wind.enabled = true;
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.tick();

        assert!(main_loop.stations[0].high_wind_blink.is_some());
    }

    #[test]
    fn test_moderate_wind_uses_fade_timer() {
        let mut metar = vfr_metar("KMSN");
        metar.wind_speed_kt = Some(20);
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), metar);

        let mut config = quiet_config();
        config.wind.enabled = true;
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.tick();

        let station = &main_loop.stations[0];
        assert!(station.wind_blink.is_some());
        assert!(station.high_wind_blink.is_none());
        let shown = main_loop.driver().pixel(0).unwrap();
        assert!(shown == config.colors.vfr || shown == config.colors.vfr_fade);
    }

    #[test]
    fn test_calm_wind_drops_timers() {
        let mut metar = vfr_metar("KMSN");
        metar.wind_speed_kt = Some(20);
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), metar.clone());

        let mut config = quiet_config();
        config.wind.enabled = true;
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.tick();
        assert!(main_loop.stations[0].wind_blink.is_some());

        metar.wind_speed_kt = Some(3);
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), metar);
        main_loop.source.set_reports(reports);
        main_loop.tick();
        assert!(main_loop.stations[0].wind_blink.is_none());
    }

    #[test]
    fn test_lightning_creates_burst_timer() {
        let mut metar = vfr_metar("KMSN");
        metar.raw_text = Some("KMSN 241753Z 10005KT 10SM TS FEW045 24/18 A3001".to_string());
        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), metar);

        let mut config = quiet_config();
        config.lightning.enabled = true;
        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.tick();

        let station = &main_loop.stations[0];
        assert!(station.lightning_blink.is_some());
        let shown = main_loop.driver().pixel(0).unwrap();
        assert!(shown == config.colors.vfr || shown == config.colors.lightning);
    }

    #[test]
    fn test_dim_period_scales_colors() {
        use chrono::{NaiveTime, TimeZone};

        let mut reports = HashMap::new();
        reports.insert("KMSN".to_string(), vfr_metar("KMSN"));

        let mut config = quiet_config();
        config.day_night.enabled = true;
        config.day_night.brightness_dim = 0.1;
        config.day_night.bright_time_start = NaiveTime::from_hms_opt(7, 0, 0);
        config.day_night.dim_time_start = NaiveTime::from_hms_opt(21, 0, 0);

        let source = StaticSource::new(reports);
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());

        let midnight = Local.with_ymd_and_hms(2024, 6, 1, 0, 30, 0).unwrap();
        main_loop.tick_at(midnight);
        assert_eq!(
            main_loop.driver().pixel(0),
            Some(config.colors.vfr.scaled(0.1))
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let config = quiet_config();
        let source = StaticSource::new(HashMap::new());
        let mut main_loop = MainLoop::new(&config, &station_map(), source, MemoryLedDriver::new());
        main_loop.close();
        main_loop.close();
        assert!(main_loop.driver().is_closed());
    }
}
