use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 8-bit color in OpenCV channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { b, g, r }
    }

    #[inline]
    pub const fn bgr(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }

    /// Hue in `0..180` and saturation in `0..=255`, OpenCV's 8-bit HSV convention.
    pub fn hue_saturation(&self) -> (f32, f32) {
        let (r, g, b) = (self.r as f32, self.g as f32, self.b as f32);
        let v = r.max(g).max(b);
        let min = r.min(g).min(b);
        let diff = v - min;

        let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };

        if diff <= 0.0 {
            return (0.0, s.round());
        }

        let mut h = if v == r {
            60.0 * (g - b) / diff
        } else if v == g {
            120.0 + 60.0 * (b - r) / diff
        } else {
            240.0 + 60.0 * (r - g) / diff
        };

        if h < 0.0 {
            h += 360.0;
        }

        let h = (h / 2.0).round();
        (if h >= 180.0 { h - 180.0 } else { h }, s.round())
    }

    /// Per-channel blend, `alpha` weights `self`.
    pub fn blend(&self, other: Color, alpha: f32) -> Color {
        let mix = |a: u8, b: u8| (a as f32 * alpha + b as f32 * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8;

        Color::bgr(mix(self.b, other.b), mix(self.g, other.g), mix(self.r, other.r))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hex color {:?}", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ParseColorError(s.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ParseColorError(s.to_string()))
        };

        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Palette {
    pub team_1: Color,
    pub team_2: Color,
    pub referee: Color,
    pub ball: Color,
    pub neutral: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            team_1: Color::rgb(0x00, 0xFF, 0xFF),
            team_2: Color::rgb(0xD2, 0x00, 0xD2),
            referee: Color::rgb(0x62, 0x00, 0xFF),
            ball: Color::rgb(0xFF, 0xFF, 0x00),
            neutral: Color::rgb(0x88, 0x88, 0x88),
        }
    }
}
