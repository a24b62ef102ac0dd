//! RGB color value type used for LED output

use serde::{Deserialize, Serialize};

use crate::error::MetarMapError;
use crate::Result;

/// One LED color. Channel ordering on the wire is the driver's concern;
/// this type is always logical `{r, g, b}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Alternate constructor from a hex code like `"00ff00"` or `"#00ff00"`
    pub fn from_hex(hex_code: &str) -> Result<Self> {
        let hex = hex_code.trim_start_matches('#');
        // Byte-indexed slicing below requires ASCII input
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(MetarMapError::validation(format!(
                "hex color must be 6 hex digits, got '{hex_code}'"
            )));
        }
        let parse = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| MetarMapError::validation(format!("invalid hex color '{hex_code}'")))
        };
        Ok(Self {
            r: parse(0..2)?,
            g: parse(2..4)?,
            b: parse(4..6)?,
        })
    }

    /// Scale every channel by `brightness`, which must be in `0.0..=1.0`.
    /// Out-of-range multipliers are clamped rather than rejected.
    #[must_use]
    pub fn scaled(self, brightness: f64) -> Self {
        let brightness = brightness.clamp(0.0, 1.0);
        let scale = |channel: u8| (f64::from(channel) * brightness).round() as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
        }
    }

    /// Half-intensity version of this color, the default "fade" used by the
    /// wind blink animation when no explicit fade variant is configured.
    #[must_use]
    pub fn faded(self) -> Self {
        self.scaled(0.5)
    }

    /// Hex string form, mostly for logs
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
