use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// A color as it crosses the protocol boundary, with every channel normalized to `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "opaque")]
    pub a: f64,
}

pub(crate) fn opaque() -> f64 {
    1.0
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Color {
        Color { r, g, b, a }
    }

    /// Convert to the 8-bit representation that surfaces store.
    ///
    /// Channels outside `[0, 1]` are clamped; a NaN channel ends up as zero.
    pub fn to_rgba8(self) -> Rgba8 {
        Rgba8 {
            r: channel(self.r),
            g: channel(self.g),
            b: channel(self.b),
            a: channel(self.a),
        }
    }
}

fn channel(x: f64) -> u8 {
    // `as` saturates, and maps NaN to 0.
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl From<Rgba8> for Color {
    fn from(c: Rgba8) -> Self {
        let f = |x: u8| f64::from(x) / 255.0;
        Color::rgba(f(c.r), f(c.g), f(c.b), f(c.a))
    }
}

/// The surface-native color: straight (not premultiplied) 8-bit RGBA.
///
/// On the wire this is a 4-byte array, and as text it is `#rrggbbaa`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 4]", into = "[u8; 4]")]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Rgba8 = Rgba8::new(0, 0, 0, 0);
    pub const BLACK: Rgba8 = Rgba8::new(0, 0, 0, 255);
    pub const WHITE: Rgba8 = Rgba8::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Rgba8 {
        Rgba8 { r, g, b, a }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> Result<Rgba8, ProtocolError> {
        let bad = || ProtocolError::BadColor(s.to_owned());
        let digits = s.strip_prefix('#').unwrap_or(s);
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(bad());
        }
        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| bad());
        let a = if digits.len() == 8 { byte(6)? } else { 255 };
        Ok(Rgba8::new(byte(0)?, byte(2)?, byte(4)?, a))
    }
}

impl From<[u8; 4]> for Rgba8 {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Rgba8 { r, g, b, a }
    }
}

impl From<Rgba8> for [u8; 4] {
    fn from(c: Rgba8) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}

impl std::fmt::Display for Rgba8 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_is_red() {
        let red = Color::rgba(1.0, 0.0, 0.0, 1.0).to_rgba8();
        assert_eq!(red, Rgba8::new(255, 0, 0, 255));
        assert_eq!(red.to_hex(), "#ff0000ff");
    }

    #[test]
    fn half_alpha_survives_hex() {
        let c = Color::rgba(1.0, 0.0, 0.0, 0.5).to_rgba8();
        assert_eq!(c.a, 128);
        assert_eq!(Rgba8::from_hex(&c.to_hex()).unwrap(), c);
        let back = Color::from(c);
        assert!((back.a - 0.5).abs() < 1.0 / 255.0);
    }

    #[test]
    fn out_of_range_channels_clamp() {
        let c = Color::rgba(2.0, -1.0, f64::NAN, 7.0).to_rgba8();
        assert_eq!(c, Rgba8::new(255, 0, 0, 255));
    }

    #[test]
    fn short_hex() {
        assert_eq!(Rgba8::from_hex("#00ff00").unwrap(), Rgba8::new(0, 255, 0, 255));
        assert!(Rgba8::from_hex("#00ff0").is_err());
        assert!(Rgba8::from_hex("zzzzzz").is_err());
    }
}
