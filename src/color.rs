use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRgba {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    pub fn as_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        [channel(self.r), channel(self.g), channel(self.b), channel(self.a)]
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        let [r, g, b, a] = self.to_rgba8();
        tiny_skia::Color::from_rgba8(r, g, b, a)
    }

    pub fn validate(&self, label: &str) -> Result<()> {
        for (channel, value) in [("r", self.r), ("g", self.g), ("b", self.b), ("a", self.a)] {
            if !value.is_finite() {
                bail!("{label}.{channel} must be finite");
            }
        }
        Ok(())
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl FromStr for ColorRgba {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let value = raw.trim();
        if let Some(named) = named_color(&value.to_ascii_lowercase()) {
            return Ok(named);
        }

        let hex = value
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("unsupported color '{raw}' (expected #rgb, #rrggbb or a name)"))?;
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            bail!("color '{raw}' contains non-hex digits");
        }

        let nibble = |index: usize| -> Result<u8> {
            u8::from_str_radix(&hex[index..index + 1], 16)
                .map(|value| value * 17)
                .map_err(|error| anyhow!("color '{raw}': {error}"))
        };
        let byte = |index: usize| -> Result<u8> {
            u8::from_str_radix(&hex[index..index + 2], 16)
                .map_err(|error| anyhow!("color '{raw}': {error}"))
        };

        match hex.len() {
            3 => Ok(Self::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
            4 => Ok(Self::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
            6 => Ok(Self::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Self::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            other => bail!("color '{raw}' has {other} hex digits (expected 3, 4, 6 or 8)"),
        }
    }
}

fn named_color(name: &str) -> Option<ColorRgba> {
    let color = match name {
        "black" => ColorRgba::BLACK,
        "white" => ColorRgba::WHITE,
        "transparent" => ColorRgba::TRANSPARENT,
        "red" => ColorRgba::rgb(1.0, 0.0, 0.0),
        "lime" => ColorRgba::rgb(0.0, 1.0, 0.0),
        "green" => ColorRgba::from_rgba8(0, 128, 0, 255),
        "blue" => ColorRgba::rgb(0.0, 0.0, 1.0),
        "cyan" => ColorRgba::rgb(0.0, 1.0, 1.0),
        "magenta" => ColorRgba::rgb(1.0, 0.0, 1.0),
        "yellow" => ColorRgba::rgb(1.0, 1.0, 0.0),
        "gray" | "grey" => ColorRgba::from_rgba8(128, 128, 128, 255),
        _ => return None,
    };
    Some(color)
}

impl fmt::Display for ColorRgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Text(String),
    Channels {
        r: f32,
        g: f32,
        b: f32,
        #[serde(default = "default_alpha")]
        a: f32,
    },
}

fn default_alpha() -> f32 {
    1.0
}

impl<'de> Deserialize<'de> for ColorRgba {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match ColorRepr::deserialize(deserializer)? {
            ColorRepr::Text(raw) => raw.parse().map_err(DeError::custom),
            ColorRepr::Channels { r, g, b, a } => Ok(Self::new(r, g, b, a)),
        }
    }
}

impl Serialize for ColorRgba {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}
