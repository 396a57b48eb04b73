use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{CharacterData, GlyphSet, PatternContext, ASCII_RAMP};
use crate::region::RenderRegion;

pub const ID: &str = "cell_noise";

/// Reseeds per animation-time unit.
const RESEEDS_PER_UNIT: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CellNoiseOptions {
    pub glyph_set: GlyphSet,
    pub animation_speed: f32,
    pub seed: u64,
    /// Probability that a cell shows a glyph at all.
    pub fill: f32,
    pub padding: u32,
}

impl Default for CellNoiseOptions {
    fn default() -> Self {
        Self {
            glyph_set: GlyphSet::from_text(ASCII_RAMP),
            animation_speed: 1.0,
            seed: 0,
            fill: 1.0,
            padding: 0,
        }
    }
}

/// Random glyph per cell, refreshed at a bounded rate.
#[derive(Debug, Clone)]
pub struct CellNoisePattern {
    options: CellNoiseOptions,
    pub(super) dirty: bool,
}

impl Default for CellNoisePattern {
    fn default() -> Self {
        Self::new(CellNoiseOptions::default())
    }
}

impl CellNoisePattern {
    pub fn new(options: CellNoiseOptions) -> Self {
        Self {
            options,
            dirty: true,
        }
    }

    pub fn options(&self) -> &CellNoiseOptions {
        &self.options
    }

    pub fn initialize(&mut self, _region: &RenderRegion) {
        self.dirty = true;
    }

    pub fn set_options(&mut self, options: CellNoiseOptions) {
        self.options = options;
        self.dirty = true;
    }

    /// Seed used for the frame at `animation_time`.
    pub fn frame_seed(&self, animation_time: f32) -> u64 {
        let step = (animation_time * self.options.animation_speed * RESEEDS_PER_UNIT).floor();
        let step = if step.is_finite() { step as i64 } else { 0 };
        self.options.seed.wrapping_add_signed(step)
    }

    pub fn generate(&self, ctx: &PatternContext<'_>) -> Vec<CharacterData> {
        let region = ctx.region;
        let glyphs = &self.options.glyph_set;
        if glyphs.is_empty() || region.is_degenerate() {
            return Vec::new();
        }

        let fill = self.options.fill;
        let mut rng = StdRng::seed_from_u64(self.frame_seed(ctx.animation_time));
        let mut characters = Vec::new();
        for row in region.start_row..region.end_row {
            for column in region.start_column..region.end_column {
                let value = rng.random::<f32>();
                if !(value < fill) {
                    continue;
                }
                let normalized = if fill < 1.0 { value / fill } else { value };
                let Some(glyph) = glyphs.pick(normalized) else {
                    continue;
                };
                let (x, y) = region.cell_origin(column, row);
                characters.push(CharacterData::new(x, y, glyph));
            }
        }
        characters
    }
}
