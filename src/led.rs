//! LED driver boundary
//!
//! The render loop only ever talks to the [`LedDriver`] trait; the actual
//! NeoPixel/WS281x hardware driver lives outside this crate. Two in-crate
//! implementations cover headless runs and tests.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::color::RgbColor;

/// Contract a hardware driver must satisfy.
///
/// `update` is expected to be idempotent per `(index, color)` pair; the
/// render loop only calls it when a station's color actually changed.
pub trait LedDriver {
    /// Push one pixel's color to the hardware
    fn update(&mut self, pixel_index: usize, color: RgbColor);

    /// Turn the lights off and release the hardware. Called exactly once.
    fn close(&mut self);

    /// Whether the driver is in a usable state
    fn is_valid(&self) -> bool {
        true
    }
}

/// Driver that just logs updates, for running the map without hardware
#[derive(Debug, Default)]
pub struct LoggingLedDriver;

impl LedDriver for LoggingLedDriver {
    fn update(&mut self, pixel_index: usize, color: RgbColor) {
        debug!(pixel_index, color = %color.hex(), "LED update");
    }

    fn close(&mut self) {
        info!("LED driver closed");
    }
}

/// Driver that records every update, used by tests and demos to observe the
/// render pipeline's output
#[derive(Debug, Default)]
pub struct MemoryLedDriver {
    pixels: HashMap<usize, RgbColor>,
    updates: Vec<(usize, RgbColor)>,
    closed: bool,
}

impl MemoryLedDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last color pushed for a pixel, if any
    #[must_use]
    pub fn pixel(&self, index: usize) -> Option<RgbColor> {
        self.pixels.get(&index).copied()
    }

    /// Every update in call order
    #[must_use]
    pub fn updates(&self) -> &[(usize, RgbColor)] {
        &self.updates
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.len()
    }

    pub fn clear_updates(&mut self) {
        self.updates.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl LedDriver for MemoryLedDriver {
    fn update(&mut self, pixel_index: usize, color: RgbColor) {
        self.pixels.insert(pixel_index, color);
        self.updates.push((pixel_index, color));
    }

    fn close(&mut self) {
        self.pixels.clear();
        self.closed = true;
    }

    fn is_valid(&self) -> bool {
        !self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_driver_records_updates() {
        let mut driver = MemoryLedDriver::new();
        driver.update(3, RgbColor::new(0, 255, 0));
        driver.update(3, RgbColor::new(255, 0, 0));
        assert_eq!(driver.pixel(3), Some(RgbColor::new(255, 0, 0)));
        assert_eq!(driver.update_count(), 2);
        assert!(driver.is_valid());

        driver.close();
        assert!(driver.is_closed());
        assert!(!driver.is_valid());
        assert_eq!(driver.pixel(3), None);
    }
}
