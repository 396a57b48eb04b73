use serde::{Deserialize, Serialize};

use super::GlyphSet;
use crate::region::RenderRegion;

pub const ID: &str = "blank";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BlankOptions {
    pub glyph_set: GlyphSet,
    pub animation_speed: f32,
}

impl Default for BlankOptions {
    fn default() -> Self {
        Self {
            glyph_set: GlyphSet::default(),
            animation_speed: 1.0,
        }
    }
}

/// Draws nothing. Used until a real pattern is chosen.
#[derive(Debug, Clone)]
pub struct BlankPattern {
    options: BlankOptions,
    pub(super) dirty: bool,
}

impl Default for BlankPattern {
    fn default() -> Self {
        Self::new(BlankOptions::default())
    }
}

impl BlankPattern {
    pub fn new(options: BlankOptions) -> Self {
        Self {
            options,
            dirty: true,
        }
    }

    pub fn options(&self) -> &BlankOptions {
        &self.options
    }

    pub fn initialize(&mut self, _region: &RenderRegion) {
        self.dirty = true;
    }

    pub fn set_options(&mut self, options: BlankOptions) {
        self.options = options;
        self.dirty = true;
    }
}
