//! End-to-end tests: XML response through the parser, source and render loop
//! down to recorded LED updates.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metarmap::config::load_station_map;
use metarmap::led::{LedDriver, MemoryLedDriver};
use metarmap::metar::FlightCategory;
use metarmap::source::{MetarSource, ReportFetcher, SourcePoller, StaticSource};
use metarmap::{parse_metar_xml, MainLoop, Metar, MetarMapConfig, Result, RgbColor};

const RESPONSE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response version="1.2">
    <data num_results="3">
        <METAR>
            <raw_text>KMSN 241753Z 10005KT 10SM FEW045 24/18 A3001</raw_text>
            <station_id>KMSN</station_id>
            <wind_dir_degrees>100</wind_dir_degrees>
            <wind_speed_kt>5</wind_speed_kt>
            <flight_category>VFR</flight_category>
        </METAR>
        <METAR>
            <raw_text>KOSH 241753Z 27030G42KT 2SM RA OVC008 18/16 A2975</raw_text>
            <station_id>KOSH</station_id>
            <wind_speed_kt>30</wind_speed_kt>
            <wind_gust_kt>42</wind_gust_kt>
            <flight_category>IFR</flight_category>
        </METAR>
        <METAR>
            <raw_text>KGRB 241753Z 00000KT 1/2SM FG VV002 14/14 A2990</raw_text>
            <station_id>KGRB</station_id>
            <wind_speed_kt>0</wind_speed_kt>
            <flight_category>LIFR</flight_category>
        </METAR>
    </data>
</response>"#;

/// LED driver the test keeps a handle to while the render loop owns the other
#[derive(Clone, Default)]
struct SharedDriver {
    inner: Arc<Mutex<MemoryLedDriver>>,
}

impl SharedDriver {
    fn pixel(&self, index: usize) -> Option<RgbColor> {
        self.inner.lock().unwrap().pixel(index)
    }

    fn update_count(&self) -> usize {
        self.inner.lock().unwrap().update_count()
    }

    fn colors_seen(&self, index: usize) -> HashSet<RgbColor> {
        self.inner
            .lock()
            .unwrap()
            .updates()
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, color)| *color)
            .collect()
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().is_closed()
    }
}

impl LedDriver for SharedDriver {
    fn update(&mut self, pixel_index: usize, color: RgbColor) {
        self.inner.lock().unwrap().update(pixel_index, color);
    }

    fn close(&mut self) {
        self.inner.lock().unwrap().close();
    }
}

fn quiet_config() -> MetarMapConfig {
    let mut config = MetarMapConfig::default();
    config.wind.enabled = false;
    config.lightning.enabled = false;
    config.day_night.enabled = false;
    config
}

fn station_map() -> Vec<(String, usize)> {
    vec![
        ("KMSN".to_string(), 0),
        ("KOSH".to_string(), 1),
        ("KGRB".to_string(), 2),
    ]
}

#[test]
fn test_xml_response_lights_the_map() {
    let reports = parse_metar_xml(RESPONSE_XML).unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports["KOSH"].flight_category, Some(FlightCategory::Ifr));
    assert_eq!(reports["KOSH"].wind_gust_kt, Some(42));

    let config = quiet_config();
    let driver = SharedDriver::default();
    let source = StaticSource::new(reports);
    let mut main_loop = MainLoop::new(&config, &station_map(), source, driver.clone());
    main_loop.tick();

    assert_eq!(driver.pixel(0), Some(config.colors.vfr));
    assert_eq!(driver.pixel(1), Some(config.colors.ifr));
    assert_eq!(driver.pixel(2), Some(config.colors.lifr));
}

#[test]
fn test_steady_conditions_push_each_pixel_once() {
    let reports = parse_metar_xml(RESPONSE_XML).unwrap();
    let config = quiet_config();
    let driver = SharedDriver::default();
    let source = StaticSource::new(reports);
    let mut main_loop = MainLoop::new(&config, &station_map(), source, driver.clone());

    for _ in 0..10 {
        main_loop.tick();
    }
    assert_eq!(driver.update_count(), 3);
}

#[test]
fn test_gusty_station_alternates_between_two_colors() {
    let reports = parse_metar_xml(RESPONSE_XML).unwrap();
    let mut config = quiet_config();
    config.wind.enabled = true;
    // Short cycles so both phases appear within the sampling window
    config.wind.gust_cycle_min_secs = 0.02;
    config.wind.gust_cycle_max_secs = 0.04;

    let driver = SharedDriver::default();
    let source = StaticSource::new(reports);
    let mut main_loop = MainLoop::new(&config, &station_map(), source, driver.clone());

    for _ in 0..200 {
        main_loop.tick();
        std::thread::sleep(Duration::from_millis(2));
    }

    // KOSH gusts at 42 kt: it must have shown both the category color and
    // the high-wind color, and nothing else
    let seen = driver.colors_seen(1);
    assert!(seen.contains(&config.colors.ifr));
    assert!(seen.contains(&config.colors.high_winds));
    assert_eq!(seen.len(), 2);

    // The calm station never animates
    assert_eq!(driver.colors_seen(0).len(), 1);
}

#[test]
fn test_stale_source_clears_the_map() {
    let reports = parse_metar_xml(RESPONSE_XML).unwrap();
    let config = quiet_config();
    let driver = SharedDriver::default();
    let source = StaticSource::new(reports);
    let mut main_loop = MainLoop::new(&config, &station_map(), source, driver.clone());
    main_loop.tick();
    assert_eq!(driver.pixel(2), Some(config.colors.lifr));

    main_loop.source_mut().set_stale();
    main_loop.tick();
    for pixel in 0..3 {
        assert_eq!(driver.pixel(pixel), Some(config.colors.clear));
    }
}

#[test]
fn test_poller_feeds_the_render_loop() {
    struct CannedFetcher;
    impl ReportFetcher for CannedFetcher {
        fn check_connection(&self) -> bool {
            true
        }
        fn fetch_raw(&self) -> Result<String> {
            Ok(RESPONSE_XML.to_string())
        }
    }

    let poller = SourcePoller::new(
        CannedFetcher,
        Duration::from_secs(3600),
        Duration::from_secs(7200),
    );
    let source = poller.spawn().unwrap();

    // The worker publishes its first snapshot almost immediately
    let mut waited = Duration::ZERO;
    while !source.new_data() && waited < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(20));
        waited += Duration::from_millis(20);
    }
    assert!(source.new_data(), "poller never published a snapshot");
    assert!(!source.data_is_stale());

    let config = quiet_config();
    let driver = SharedDriver::default();
    let mut main_loop = MainLoop::new(&config, &station_map(), source, driver.clone());
    main_loop.tick();

    assert_eq!(driver.pixel(0), Some(config.colors.vfr));
    assert_eq!(driver.pixel(1), Some(config.colors.ifr));
    assert_eq!(driver.pixel(2), Some(config.colors.lifr));
}

#[test]
fn test_drop_closes_the_driver() {
    let mut reports = HashMap::new();
    let mut metar = Metar::new("KMSN");
    metar.flight_category = Some(FlightCategory::Vfr);
    reports.insert("KMSN".to_string(), metar);

    let config = quiet_config();
    let driver = SharedDriver::default();
    let source = StaticSource::new(reports);
    let mut main_loop = MainLoop::new(&config, &station_map(), source, driver.clone());
    main_loop.tick();
    assert!(!driver.is_closed());

    drop(main_loop);
    assert!(driver.is_closed());
}

#[test]
fn test_station_map_file_drives_the_loop() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# three Wisconsin stations").unwrap();
    writeln!(file, "KMSN,0").unwrap();
    writeln!(file, "KOSH,1").unwrap();
    writeln!(file, "KGRB,2").unwrap();

    let map = load_station_map(file.path()).unwrap();
    assert_eq!(map.len(), 3);

    let reports = parse_metar_xml(RESPONSE_XML).unwrap();
    let config = quiet_config();
    let driver = SharedDriver::default();
    let source = StaticSource::new(reports);
    let mut main_loop = MainLoop::new(&config, &map, source, driver.clone());
    main_loop.tick();

    assert_eq!(driver.pixel(1), Some(config.colors.ifr));
}
