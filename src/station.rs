//! Per-station render state
//!
//! Each map location owns its LED index, the color currently shown there, and
//! its own animation timers. Timers are per station so neighboring LEDs do not
//! blink in lockstep.

use tracing::trace;

use crate::animation::{BurstBlink, RandomBlink};
use crate::color::RgbColor;

/// One mapped station on the LED strip
#[derive(Debug)]
pub struct Station {
    /// Station identifier, e.g. `KMSN`
    pub id: String,
    /// Zero-based position on the LED strip
    pub pixel_index: usize,
    /// Color currently pushed to the hardware, if any
    active_color: Option<RgbColor>,
    /// Raised when the computed color differs from the active one
    dirty: bool,
    /// Duty-cycle timer for windy conditions
    pub wind_blink: Option<RandomBlink>,
    /// Duty-cycle timer for high-wind/gust conditions
    pub high_wind_blink: Option<RandomBlink>,
    /// Burst timer for reported lightning
    pub lightning_blink: Option<BurstBlink>,
}

impl Station {
    #[must_use]
    pub fn new(id: impl Into<String>, pixel_index: usize) -> Self {
        Self {
            id: id.into(),
            pixel_index,
            active_color: None,
            dirty: false,
            wind_blink: None,
            high_wind_blink: None,
            lightning_blink: None,
        }
    }

    /// Record the color this tick computed for the station. Raises the dirty
    /// flag only when it differs from what the hardware is already showing.
    pub fn set_color(&mut self, color: RgbColor) {
        if self.active_color != Some(color) {
            trace!(station = %self.id, color = %color.hex(), "station color changed");
            self.active_color = Some(color);
            self.dirty = true;
        }
    }

    /// Whether the station needs a hardware update this tick
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Lower the dirty flag once the color has been pushed
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    #[must_use]
    pub fn active_color(&self) -> Option<RgbColor> {
        self.active_color
    }

    /// Drop all animation timers, e.g. when conditions no longer apply
    pub fn clear_timers(&mut self) {
        self.wind_blink = None;
        self.high_wind_blink = None;
        self.lightning_blink = None;
    }
}
