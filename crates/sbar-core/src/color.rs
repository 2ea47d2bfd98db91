//! ARGB color value used for the bar background and indicator glyphs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A 32-bit ARGB color.
///
/// Serialized as `#AARRGGBB` (or `#RRGGBB`, which implies full opacity)
/// so preference files and wire messages stay human-readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(u32);

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color(0x0000_0000);

    /// Opaque black, the default bar background.
    pub const BLACK: Color = Color(0xFF00_0000);

    /// Opaque white, the default glyph color.
    pub const WHITE: Color = Color(0xFFFF_FFFF);

    /// Creates a color from a packed ARGB value.
    pub const fn from_argb(argb: u32) -> Self {
        Self(argb)
    }

    /// Returns the packed ARGB value.
    pub const fn argb(&self) -> u32 {
        self.0
    }

    /// Returns the alpha channel.
    pub const fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns true if the color has no opacity at all.
    pub const fn is_transparent(&self) -> bool {
        self.alpha() == 0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl FromStr for Color {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidFieldValue {
            field: "color".to_string(),
            value: s.to_string(),
            expected: "#AARRGGBB or #RRGGBB".to_string(),
        };

        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        // from_str_radix alone would accept a leading sign.
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;

        match hex.len() {
            8 => Ok(Self(value)),
            6 => Ok(Self(0xFF00_0000 | value)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}
