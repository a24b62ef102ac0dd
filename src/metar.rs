//! Typed model of one station's METAR report
//!
//! Every numeric field is coerced from the raw dataserver string
//! independently: a value that fails to convert leaves the field at its
//! previous state and never invalidates the rest of the record.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

/// Raw-text substrings that indicate thunderstorm activity at the station
const LIGHTNING_KEYWORDS: [&str; 3] = ["LTG", "TS", "TSNO"];

/// Coarse visibility/ceiling classification reported per station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightCategory {
    Vfr,
    Mvfr,
    Ifr,
    Lifr,
}

impl FlightCategory {
    /// Parse the dataserver's category string, `None` for anything unrecognized
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "VFR" => Some(Self::Vfr),
            "MVFR" => Some(Self::Mvfr),
            "IFR" => Some(Self::Ifr),
            "LIFR" => Some(Self::Lifr),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vfr => "VFR",
            Self::Mvfr => "MVFR",
            Self::Ifr => "IFR",
            Self::Lifr => "LIFR",
        }
    }
}

/// Wind direction, which the dataserver reports either in degrees or as the
/// marker `VRB` for variable winds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindDirection {
    Degrees(f64),
    Variable,
}

impl WindDirection {
    /// Numeric bearing, `None` for variable winds
    #[must_use]
    pub fn degrees(self) -> Option<f64> {
        match self {
            Self::Degrees(deg) => Some(deg),
            Self::Variable => None,
        }
    }
}

/// One sky condition layer, e.g. `FEW` at 4300 ft AGL.
/// A report may carry several, in observation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkyCondition {
    pub sky_cover: String,
    pub cloud_base_ft_agl: Option<i32>,
}

/// Whether a tag name handed to [`Metar::set_field`] was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    Known,
    Unknown,
}

/// One station's weather snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metar {
    pub station: String,
    pub raw_text: Option<String>,
    pub observation_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub temp_c: Option<f64>,
    pub dewpoint_c: Option<f64>,
    pub wind_dir: Option<WindDirection>,
    pub wind_speed_kt: Option<u32>,
    pub wind_gust_kt: Option<u32>,
    pub visibility_statute_mi: Option<f64>,
    pub altim_in_hg: Option<f64>,
    pub sea_level_pressure_mb: Option<f64>,
    pub wx_string: Option<String>,
    pub flight_category: Option<FlightCategory>,
    pub precip_in: Option<f64>,
    pub metar_type: Option<String>,
    pub elevation_m: Option<f64>,
    pub quality_control_flags: Option<String>,
    pub sky_conditions: Vec<SkyCondition>,
}

/// Attempt a string-to-number conversion, logging and returning `None` on
/// failure so the caller keeps the field's prior value
fn coerce<T: std::str::FromStr>(station: &str, field: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(station, field, value = raw, "failed to coerce METAR field");
            None
        }
    }
}

impl Metar {
    /// Create an empty record for one station
    #[must_use]
    pub fn new<S: Into<String>>(station: S) -> Self {
        Self {
            station: station.into(),
            ..Self::default()
        }
    }

    /// Set a field by its dataserver tag name.
    ///
    /// This is the one dispatch point between tag names and typed setters;
    /// unknown tags are reported to the caller instead of failing the record.
    /// `sky_condition` is attribute-carried and goes through
    /// [`Metar::add_sky_condition`] instead.
    pub fn set_field(&mut self, tag: &str, value: &str) -> FieldOutcome {
        match tag {
            "raw_text" => self.raw_text = Some(value.to_string()),
            "observation_time" => self.set_observation_time(value),
            "latitude" => self.set_f64(|m| &mut m.latitude, "latitude", value),
            "longitude" => self.set_f64(|m| &mut m.longitude, "longitude", value),
            "temp_c" => self.set_f64(|m| &mut m.temp_c, "temp_c", value),
            "dewpoint_c" => self.set_f64(|m| &mut m.dewpoint_c, "dewpoint_c", value),
            "wind_dir_degrees" => self.set_wind_dir(value),
            "wind_speed_kt" => self.set_u32(|m| &mut m.wind_speed_kt, "wind_speed_kt", value),
            "wind_gust_kt" => self.set_u32(|m| &mut m.wind_gust_kt, "wind_gust_kt", value),
            "visibility_statute_mi" => self.set_visibility(value),
            "altim_in_hg" => self.set_f64(|m| &mut m.altim_in_hg, "altim_in_hg", value),
            "sea_level_pressure_mb" => {
                self.set_f64(|m| &mut m.sea_level_pressure_mb, "sea_level_pressure_mb", value);
            }
            "wx_string" => self.wx_string = Some(value.to_string()),
            "flight_category" => self.set_flight_category(value),
            "precip_in" => self.set_f64(|m| &mut m.precip_in, "precip_in", value),
            "metar_type" => self.metar_type = Some(value.to_string()),
            "elevation_m" => self.set_f64(|m| &mut m.elevation_m, "elevation_m", value),
            "quality_control_flags" => self.quality_control_flags = Some(value.to_string()),
            _ => return FieldOutcome::Unknown,
        }
        FieldOutcome::Known
    }

    fn set_f64(&mut self, field: fn(&mut Self) -> &mut Option<f64>, name: &str, value: &str) {
        if let Some(parsed) = coerce::<f64>(&self.station, name, value) {
            *field(self) = Some(parsed);
        }
    }

    fn set_u32(&mut self, field: fn(&mut Self) -> &mut Option<u32>, name: &str, value: &str) {
        if let Some(parsed) = coerce::<u32>(&self.station, name, value) {
            *field(self) = Some(parsed);
        }
    }

    /// Observation times come in the fixed `YYYY-MM-DDThh:mm:ssZ` layout.
    /// Anything else leaves the field untouched.
    pub fn set_observation_time(&mut self, value: &str) {
        match NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%SZ") {
            Ok(naive) => self.observation_time = Some(naive.and_utc()),
            Err(_) => {
                warn!(
                    station = %self.station,
                    value, "unparseable observation_time in METAR"
                );
            }
        }
    }

    /// Wind direction is degrees or the literal `VRB` for variable winds
    pub fn set_wind_dir(&mut self, value: &str) {
        if value.trim().eq_ignore_ascii_case("vrb") {
            self.wind_dir = Some(WindDirection::Variable);
        } else if let Some(deg) = coerce::<f64>(&self.station, "wind_dir_degrees", value) {
            self.wind_dir = Some(WindDirection::Degrees(deg));
        }
    }

    /// Visibility can report as `10+` for "at least"; the `+` is stripped
    pub fn set_visibility(&mut self, value: &str) {
        let trimmed = value.trim().trim_end_matches('+');
        if let Some(vis) = coerce::<f64>(&self.station, "visibility_statute_mi", trimmed) {
            self.visibility_statute_mi = Some(vis);
        }
    }

    /// Unrecognized categories are logged and leave the field unset
    pub fn set_flight_category(&mut self, value: &str) {
        match FlightCategory::parse(value) {
            Some(category) => self.flight_category = Some(category),
            None => {
                warn!(
                    station = %self.station,
                    value, "unrecognized flight_category in METAR"
                );
            }
        }
    }

    /// Append one sky condition layer; multiple layers accumulate in order
    pub fn add_sky_condition(&mut self, sky_cover: Option<&str>, cloud_base_ft_agl: Option<&str>) {
        let cloud_base = cloud_base_ft_agl
            .and_then(|raw| coerce::<i32>(&self.station, "cloud_base_ft_agl", raw));
        self.sky_conditions.push(SkyCondition {
            sky_cover: sky_cover.unwrap_or_default().to_string(),
            cloud_base_ft_agl: cloud_base,
        });
    }

    /// True if the raw report text carries a thunderstorm/lightning keyword.
    ///
    /// The leading station identifier is excluded from the search so a
    /// station id containing `TS` does not read as a thunderstorm.
    #[must_use]
    pub fn lightning_reported(&self) -> bool {
        let Some(raw) = self.raw_text.as_deref() else {
            return false;
        };
        let body = raw
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest);
        LIGHTNING_KEYWORDS
            .iter()
            .any(|keyword| body.contains(keyword))
    }
}
