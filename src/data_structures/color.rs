//! Colors as the control panel and the materials see them.
//!
//! [`Rgb`] stores normalized channels and round-trips through the `#rrggbb`
//! notation used by color pickers.

use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("'{0}' is neither a hex color nor a known color name")]
    Unknown(String),
    #[error("'{0}' has an invalid hex digit")]
    InvalidHex(String),
}

/// An RGB color with channels in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_hex(&self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// `#rrggbb`, lower case.
    pub fn to_hex_string(&self) -> String {
        format!("#{:06x}", self.to_hex())
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Decodes sRGB channels to linear light, which is what the shaders blend in.
    pub fn to_linear(&self) -> Self {
        let decode = |c: f32| {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        };
        Self::new(decode(self.r), decode(self.g), decode(self.b))
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

const NAMED: &[(&str, u32)] = &[
    ("black", 0x000000),
    ("white", 0xffffff),
    ("red", 0xff0000),
    ("lime", 0x00ff00),
    ("green", 0x008000),
    ("blue", 0x0000ff),
    ("lightblue", 0xadd8e6),
    ("skyblue", 0x87ceeb),
    ("gray", 0x808080),
    ("grey", 0x808080),
    ("orange", 0xffa500),
    ("purple", 0x800080),
    ("yellow", 0xffff00),
];

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"));
        let Some(digits) = digits else {
            let lower = trimmed.to_ascii_lowercase();
            return NAMED
                .iter()
                .find(|(name, _)| *name == lower)
                .map(|(_, hex)| Rgb::from_hex(*hex))
                .ok_or_else(|| ColorParseError::Unknown(s.to_string()));
        };
        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => digits.to_string(),
            _ => return Err(ColorParseError::InvalidHex(s.to_string())),
        };
        u32::from_str_radix(&expanded, 16)
            .map(Rgb::from_hex)
            .map_err(|_| ColorParseError::InvalidHex(s.to_string()))
    }
}

impl From<Rgb> for wgpu::Color {
    fn from(c: Rgb) -> Self {
        wgpu::Color {
            r: f64::from(c.r),
            g: f64::from(c.g),
            b: f64::from(c.b),
            a: 1.0,
        }
    }
}

impl serde::Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_string())
    }
}

impl<'de> serde::Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_hex_forms() {
        assert_eq!("lightblue".parse::<Rgb>().unwrap().to_hex(), 0xadd8e6);
        assert_eq!("#889999".parse::<Rgb>().unwrap().to_hex(), 0x889999);
        assert_eq!("0xff0000".parse::<Rgb>().unwrap().to_hex(), 0xff0000);
        assert_eq!("#0f0".parse::<Rgb>().unwrap().to_hex(), 0x00ff00);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            "#12345".parse::<Rgb>(),
            Err(ColorParseError::InvalidHex(_))
        ));
        assert!(matches!(
            "notacolor".parse::<Rgb>(),
            Err(ColorParseError::Unknown(_))
        ));
    }

    #[test]
    fn hex_string_is_lower_case_with_hash() {
        assert_eq!(Rgb::from_hex(0xADD8E6).to_hex_string(), "#add8e6");
    }

    #[test]
    fn linear_keeps_the_extremes() {
        assert_eq!(Rgb::WHITE.to_linear(), Rgb::WHITE);
        assert_eq!(Rgb::BLACK.to_linear(), Rgb::BLACK);
        let mid = Rgb::from_hex(0x808080).to_linear();
        assert!((mid.r - 0.2158).abs() < 1e-3);
    }
}
