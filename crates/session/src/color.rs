use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// One channel of an [`Rgb`] triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    R,
    G,
    B,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::R, Channel::G, Channel::B];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::R => "r",
            Self::G => "g",
            Self::B => "b",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "red" => Ok(Self::R),
            "g" | "green" => Ok(Self::G),
            "b" | "blue" => Ok(Self::B),
            other => Err(format!("unknown color channel: {other}")),
        }
    }
}

/// The color triple stored on the contract.
///
/// Channels are plain integers: the display range is `0..=255` but nothing in
/// the session core clamps, so whatever the user staged is what gets written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: i64,
    pub g: i64,
    pub b: i64,
}

impl Rgb {
    pub const fn new(r: i64, g: i64, b: i64) -> Self {
        Self { r, g, b }
    }

    pub fn get(&self, channel: Channel) -> i64 {
        match channel {
            Channel::R => self.r,
            Channel::G => self.g,
            Channel::B => self.b,
        }
    }

    /// Copy of `self` with one channel replaced.
    pub fn with(mut self, channel: Channel, value: i64) -> Self {
        match channel {
            Channel::R => self.r = value,
            Channel::G => self.g = value,
            Channel::B => self.b = value,
        }
        self
    }

    /// Channels squeezed into `0..=255`, for rendering only.
    pub fn to_display_bytes(self) -> [u8; 3] {
        let clamp = |v: i64| v.clamp(0, 255) as u8;
        [clamp(self.r), clamp(self.g), clamp(self.b)]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// The contract returns `[r, g, b]`; objects are tolerated as well.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireRgb {
    Triple(i64, i64, i64),
    Fields { r: i64, g: i64, b: i64 },
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireRgb::deserialize(deserializer)? {
            WireRgb::Triple(r, g, b) | WireRgb::Fields { r, g, b } => Self { r, g, b },
        })
    }
}

/// Parse raw text from a numeric input field.
///
/// Accepts an optionally signed base-10 integer with surrounding whitespace.
/// Empty, fractional and non-numeric text yields `None`.
pub fn parse_channel_input(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_array_and_object() {
        let from_array: Rgb = serde_json::from_str("[10, 20, 30]").unwrap();
        let from_object: Rgb = serde_json::from_str(r#"{"r":10,"g":20,"b":30}"#).unwrap();
        assert_eq!(from_array, Rgb::new(10, 20, 30));
        assert_eq!(from_object, from_array);
    }

    #[test]
    fn rejects_short_array() {
        assert!(serde_json::from_str::<Rgb>("[1, 2]").is_err());
    }

    #[test]
    fn encodes_as_object() {
        let json = serde_json::to_value(Rgb::new(1, 300, -4)).unwrap();
        assert_eq!(json, serde_json::json!({"r": 1, "g": 300, "b": -4}));
    }

    #[test]
    fn with_touches_only_one_channel() {
        let base = Rgb::new(1, 2, 3);
        for channel in Channel::ALL {
            let next = base.with(channel, 99);
            for other in Channel::ALL {
                let expected = if other == channel { 99 } else { base.get(other) };
                assert_eq!(next.get(other), expected);
            }
        }
    }

    #[test]
    fn channel_input_parsing() {
        assert_eq!(parse_channel_input("42"), Some(42));
        assert_eq!(parse_channel_input("  7 "), Some(7));
        assert_eq!(parse_channel_input("-3"), Some(-3));
        assert_eq!(parse_channel_input("300"), Some(300));
        assert_eq!(parse_channel_input(""), None);
        assert_eq!(parse_channel_input("abc"), None);
        assert_eq!(parse_channel_input("1.5"), None);
        assert_eq!(parse_channel_input("NaN"), None);
        assert_eq!(parse_channel_input("99999999999999999999"), None);
    }

    #[test]
    fn display_bytes_clamp() {
        assert_eq!(Rgb::new(-5, 128, 300).to_display_bytes(), [0, 128, 255]);
    }

    #[test]
    fn channel_names() {
        assert_eq!("Green".parse::<Channel>().unwrap(), Channel::G);
        assert_eq!(Channel::B.to_string(), "b");
        assert!("alpha".parse::<Channel>().is_err());
    }
}
