pub mod blank;
pub mod cell_noise;
pub mod noise;
pub mod rain;

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::color::ColorRgba;
use crate::region::RenderRegion;

pub use blank::{BlankOptions, BlankPattern};
pub use cell_noise::{CellNoiseOptions, CellNoisePattern};
pub use noise::{NoiseOptions, NoisePattern, PermutationTable};
pub use rain::{Drop, RainOptions, RainPattern};

pub const ASCII_RAMP: &str = " .:-=+*#%@";
pub const RAIN_GLYPHS: &str = "ｱｲｳｴｵｶｷｸｹｺｻｼｽｾｿﾀﾁﾂﾃﾄﾅﾆﾇﾈﾉﾊﾋﾌﾍﾎﾏﾐﾑﾒﾓﾔﾕﾖﾗﾘﾙﾚﾛﾜﾝ0123456789";

/// One positioned glyph, in surface pixel space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterData {
    pub x: f32,
    pub y: f32,
    pub glyph: char,
    /// Overrides the renderer color when set.
    pub color: Option<ColorRgba>,
    pub opacity: f32,
    pub scale: f32,
    /// Degrees, applied around the glyph center.
    pub rotation: f32,
}

impl CharacterData {
    pub fn new(x: f32, y: f32, glyph: char) -> Self {
        Self {
            x,
            y,
            glyph,
            color: None,
            opacity: 1.0,
            scale: 1.0,
            rotation: 0.0,
        }
    }

    pub fn with_color(mut self, color: ColorRgba) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_transform(mut self, scale: f32, rotation: f32) -> Self {
        self.scale = scale;
        self.rotation = rotation;
        self
    }

    pub fn has_transform(&self) -> bool {
        self.scale != 1.0 || self.rotation != 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub clicked: bool,
}

/// Everything a generator may observe about the current frame.
#[derive(Debug, Clone, Copy)]
pub struct PatternContext<'a> {
    /// Host timestamp in milliseconds.
    pub time: f64,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// Accumulated animation clock in seconds, scaled by the renderer speed.
    pub animation_time: f32,
    pub is_animating: bool,
    pub animation_speed: f32,
    pub region: &'a RenderRegion,
    pub pointer: Option<PointerState>,
}

impl<'a> PatternContext<'a> {
    /// A frozen context at time zero, used for static renders and tests.
    pub fn still(region: &'a RenderRegion) -> Self {
        Self {
            time: 0.0,
            delta_time: 0.0,
            animation_time: 0.0,
            is_animating: false,
            animation_speed: 1.0,
            region,
            pointer: None,
        }
    }
}

/// Ordered set of glyphs a generator draws from; written as a plain string in options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlyphSet(Vec<char>);

impl GlyphSet {
    pub fn new(glyphs: impl Into<Vec<char>>) -> Self {
        Self(glyphs.into())
    }

    pub fn from_text(text: &str) -> Self {
        Self(text.chars().collect())
    }

    pub fn as_slice(&self) -> &[char] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Maps a value in `[0, 1]` onto a glyph, clamping at both ends.
    pub fn pick(&self, normalized: f32) -> Option<char> {
        if self.0.is_empty() {
            return None;
        }
        let scaled = (normalized * self.0.len() as f32).floor();
        let index = if scaled.is_nan() || scaled < 0.0 {
            0
        } else {
            (scaled as usize).min(self.0.len() - 1)
        };
        Some(self.0[index])
    }
}

impl fmt::Display for GlyphSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for glyph in &self.0 {
            write!(f, "{glyph}")?;
        }
        Ok(())
    }
}

impl Serialize for GlyphSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GlyphSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::from_text(&text))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternOptions {
    Noise(NoiseOptions),
    Rain(RainOptions),
    CellNoise(CellNoiseOptions),
    Blank(BlankOptions),
}

impl PatternOptions {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Noise(_) => noise::ID,
            Self::Rain(_) => rain::ID,
            Self::CellNoise(_) => cell_noise::ID,
            Self::Blank(_) => blank::ID,
        }
    }
}

/// A glyph generator. Each variant owns all of its derived state.
#[derive(Debug, Clone)]
pub enum Pattern {
    Noise(NoisePattern),
    Rain(RainPattern),
    CellNoise(CellNoisePattern),
    Blank(BlankPattern),
}

impl Default for Pattern {
    fn default() -> Self {
        Self::Blank(BlankPattern::default())
    }
}

impl From<PatternOptions> for Pattern {
    fn from(options: PatternOptions) -> Self {
        match options {
            PatternOptions::Noise(options) => Self::Noise(NoisePattern::new(options)),
            PatternOptions::Rain(options) => Self::Rain(RainPattern::new(options)),
            PatternOptions::CellNoise(options) => Self::CellNoise(CellNoisePattern::new(options)),
            PatternOptions::Blank(options) => Self::Blank(BlankPattern::new(options)),
        }
    }
}

impl Pattern {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Noise(_) => noise::ID,
            Self::Rain(_) => rain::ID,
            Self::CellNoise(_) => cell_noise::ID,
            Self::Blank(_) => blank::ID,
        }
    }

    /// Binds the generator to a freshly computed region.
    pub fn initialize(&mut self, region: &RenderRegion) {
        match self {
            Self::Noise(pattern) => pattern.initialize(region),
            Self::Rain(pattern) => pattern.initialize(region),
            Self::CellNoise(pattern) => pattern.initialize(region),
            Self::Blank(pattern) => pattern.initialize(region),
        }
    }

    pub fn update(&mut self, ctx: &PatternContext<'_>) {
        match self {
            Self::Noise(_) | Self::CellNoise(_) | Self::Blank(_) => {}
            Self::Rain(pattern) => pattern.update(ctx),
        }
    }

    pub fn generate(&mut self, ctx: &PatternContext<'_>) -> Vec<CharacterData> {
        match self {
            Self::Noise(pattern) => pattern.generate(ctx),
            Self::Rain(pattern) => pattern.generate(ctx),
            Self::CellNoise(pattern) => pattern.generate(ctx),
            Self::Blank(_) => Vec::new(),
        }
    }

    /// Releases owned buffers. The pattern may be initialized again afterwards.
    pub fn destroy(&mut self) {
        match self {
            Self::Noise(pattern) => pattern.destroy(),
            Self::Rain(pattern) => pattern.destroy(),
            Self::CellNoise(_) | Self::Blank(_) => {}
        }
    }

    pub fn recommended_padding(&self) -> u32 {
        match self {
            Self::CellNoise(pattern) => pattern.options().padding,
            Self::Noise(_) | Self::Rain(_) | Self::Blank(_) => 0,
        }
    }

    /// Applies options of the same kind. Returns `false` when the kinds differ.
    pub fn set_options(&mut self, options: &PatternOptions) -> bool {
        match (self, options) {
            (Self::Noise(pattern), PatternOptions::Noise(options)) => {
                pattern.set_options(options.clone());
                true
            }
            (Self::Rain(pattern), PatternOptions::Rain(options)) => {
                pattern.set_options(options.clone());
                true
            }
            (Self::CellNoise(pattern), PatternOptions::CellNoise(options)) => {
                pattern.set_options(options.clone());
                true
            }
            (Self::Blank(pattern), PatternOptions::Blank(options)) => {
                pattern.set_options(options.clone());
                true
            }
            _ => false,
        }
    }

    pub fn options(&self) -> PatternOptions {
        match self {
            Self::Noise(pattern) => PatternOptions::Noise(pattern.options().clone()),
            Self::Rain(pattern) => PatternOptions::Rain(pattern.options().clone()),
            Self::CellNoise(pattern) => PatternOptions::CellNoise(pattern.options().clone()),
            Self::Blank(pattern) => PatternOptions::Blank(pattern.options().clone()),
        }
    }

    pub fn glyph_set(&self) -> &GlyphSet {
        match self {
            Self::Noise(pattern) => &pattern.options().glyph_set,
            Self::Rain(pattern) => &pattern.options().glyph_set,
            Self::CellNoise(pattern) => &pattern.options().glyph_set,
            Self::Blank(pattern) => &pattern.options().glyph_set,
        }
    }

    /// Returns and clears the generator's own redraw request.
    pub fn take_dirty(&mut self) -> bool {
        match self {
            Self::Noise(pattern) => std::mem::take(&mut pattern.dirty),
            Self::Rain(pattern) => std::mem::take(&mut pattern.dirty),
            Self::CellNoise(pattern) => std::mem::take(&mut pattern.dirty),
            Self::Blank(pattern) => std::mem::take(&mut pattern.dirty),
        }
    }

    /// True when every frame must be drawn from a cleared surface.
    pub fn requires_full_clear(&self) -> bool {
        matches!(self, Self::Rain(_))
    }
}

pub type PatternConstructor = fn() -> Pattern;

/// String-keyed constructor table for generators.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    constructors: BTreeMap<String, PatternConstructor>,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(noise::ID, || Pattern::Noise(NoisePattern::default()));
        registry.register(rain::ID, || Pattern::Rain(RainPattern::default()));
        registry.register(cell_noise::ID, || {
            Pattern::CellNoise(CellNoisePattern::default())
        });
        registry.register(blank::ID, || Pattern::Blank(BlankPattern::default()));
        registry
    }

    pub fn register(&mut self, key: &str, constructor: PatternConstructor) {
        self.constructors.insert(key.to_owned(), constructor);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    /// Builds the generator registered under `key`, optionally configured.
    pub fn create(&self, key: &str, options: Option<&PatternOptions>) -> Result<Pattern> {
        let Some(constructor) = self.constructors.get(key) else {
            let known = self.keys().collect::<Vec<_>>().join(", ");
            bail!("unknown pattern '{key}' (available: {known})");
        };
        let mut pattern = constructor();
        if let Some(options) = options {
            if !pattern.set_options(options) {
                bail!(
                    "pattern '{key}' cannot take options of kind '{}'",
                    options.kind()
                );
            }
            pattern.take_dirty();
        }
        Ok(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::{GlyphSet, Pattern, PatternOptions, PatternRegistry};

    #[test]
    fn registry_lists_builtin_keys_in_order() {
        let registry = PatternRegistry::builtin();
        assert_eq!(
            registry.keys().collect::<Vec<_>>(),
            vec!["blank", "cell_noise", "noise", "rain"]
        );
    }

    #[test]
    fn unknown_key_names_available_patterns() {
        let error = PatternRegistry::builtin()
            .create("plasma", None)
            .expect_err("unknown key should fail");
        let message = error.to_string();
        assert!(message.contains("plasma"));
        assert!(message.contains("noise"));
    }

    #[test]
    fn mismatched_option_kind_is_rejected() {
        let options: PatternOptions =
            serde_yaml::from_str("kind: rain\ndensity: 0.5\n").expect("rain options");
        assert!(PatternRegistry::builtin()
            .create("noise", Some(&options))
            .is_err());
        let rain = PatternRegistry::builtin()
            .create("rain", Some(&options))
            .expect("rain accepts rain options");
        assert_eq!(rain.id(), "rain");
    }

    #[test]
    fn glyph_set_pick_clamps_extremes() {
        let glyphs = GlyphSet::from_text(".#");
        assert_eq!(glyphs.pick(0.0), Some('.'));
        assert_eq!(glyphs.pick(0.5), Some('#'));
        assert_eq!(glyphs.pick(1.0), Some('#'));
        assert_eq!(glyphs.pick(-3.0), Some('.'));
        assert_eq!(GlyphSet::default().pick(0.5), None);
    }

    #[test]
    fn default_pattern_is_blank() {
        let pattern = Pattern::default();
        assert_eq!(pattern.id(), "blank");
        assert!(!pattern.requires_full_clear());
    }
}
