use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CharacterData, GlyphSet, PatternContext, RAIN_GLYPHS};
use crate::color::ColorRgba;
use crate::region::RenderRegion;

pub const ID: &str = "rain";

/// Glyphs at the head of a drop that keep full opacity.
const SOLID_HEAD_GLYPHS: usize = 3;
/// Row/column drift a resize may introduce before drops are rebuilt.
const REMAP_TOLERANCE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RainOptions {
    pub glyph_set: GlyphSet,
    pub animation_speed: f32,
    /// Live drops per visible column.
    pub density: f32,
    pub min_length: u32,
    pub max_length: u32,
    /// Rows per second.
    pub min_speed: f32,
    pub max_speed: f32,
    pub mutation_rate: f32,
    /// Minimum time between two mutations of one drop.
    pub mutation_interval_ms: f64,
    /// Opacity of the previous frame re-emitted behind the current one. Zero disables the trail.
    pub fade_opacity: f32,
    pub head_color: ColorRgba,
    /// Body color; the renderer color when unset.
    pub color: Option<ColorRgba>,
    pub seed: u64,
}

impl Default for RainOptions {
    fn default() -> Self {
        Self {
            glyph_set: GlyphSet::from_text(RAIN_GLYPHS),
            animation_speed: 1.0,
            density: 0.7,
            min_length: 6,
            max_length: 24,
            min_speed: 8.0,
            max_speed: 24.0,
            mutation_rate: 0.05,
            mutation_interval_ms: 100.0,
            fade_opacity: 0.25,
            head_color: ColorRgba::from_rgba8(220, 255, 220, 255),
            color: None,
            seed: 0,
        }
    }
}

/// One falling stream of glyphs. `y` is the head row; the tail extends upwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Drop {
    pub column: i32,
    pub y: f32,
    pub speed: f32,
    pub length: u32,
    pub glyphs: Vec<char>,
    pub last_mutation_ms: f64,
}

#[derive(Debug, Clone)]
pub struct RainPattern {
    options: RainOptions,
    drops: Vec<Drop>,
    previous: Vec<CharacterData>,
    region: Option<RenderRegion>,
    rng: StdRng,
    pub(super) dirty: bool,
}

impl Default for RainPattern {
    fn default() -> Self {
        Self::new(RainOptions::default())
    }
}

impl RainPattern {
    pub fn new(options: RainOptions) -> Self {
        let rng = StdRng::seed_from_u64(options.seed);
        Self {
            options,
            drops: Vec::new(),
            previous: Vec::new(),
            region: None,
            rng,
            dirty: true,
        }
    }

    pub fn options(&self) -> &RainOptions {
        &self.options
    }

    pub fn drops(&self) -> &[Drop] {
        &self.drops
    }

    pub fn drops_mut(&mut self) -> &mut Vec<Drop> {
        &mut self.drops
    }

    pub fn region(&self) -> Option<&RenderRegion> {
        self.region.as_ref()
    }

    /// Live population the density asks for, capped at one drop per padded cell.
    pub fn target_population(&self, region: &RenderRegion) -> usize {
        let density = self.options.density;
        if !density.is_finite() {
            return 0;
        }
        let cells = region.end_column.saturating_sub(region.start_column).max(0) as usize
            * region.end_row.saturating_sub(region.start_row).max(0) as usize;
        // Negative densities saturate to zero.
        ((region.columns as f32 * density).floor() as usize).min(cells)
    }

    /// Binds to `region`, remapping drops for small layout changes and rebuilding otherwise.
    pub fn initialize(&mut self, region: &RenderRegion) {
        self.dirty = true;
        let remap = match &self.region {
            Some(previous) if !self.drops.is_empty() => {
                previous.columns.abs_diff(region.columns) <= REMAP_TOLERANCE
                    && previous.rows.abs_diff(region.rows) <= REMAP_TOLERANCE
            }
            _ => false,
        };
        self.region = Some(*region);

        if remap {
            let first = region.start_column;
            let last = region.start_column + region.columns.max(1) as i32 - 1;
            for drop in &mut self.drops {
                drop.column = drop.column.clamp(first, last);
            }
            self.reconcile_population(region);
            return;
        }

        debug!(
            columns = region.columns,
            rows = region.rows,
            "rebuilding rain drops"
        );
        self.drops.clear();
        self.previous.clear();
        let target = self.target_population(region);
        while self.drops.len() < target {
            let drop = self.spawn_drop(region, true);
            self.drops.push(drop);
        }
    }

    pub fn set_options(&mut self, options: RainOptions) {
        if options.seed != self.options.seed {
            self.rng = StdRng::seed_from_u64(options.seed);
        }
        if options.fade_opacity <= 0.0 {
            self.previous.clear();
        }
        self.options = options;
        self.dirty = true;
    }

    pub fn destroy(&mut self) {
        self.drops.clear();
        self.previous.clear();
        self.region = None;
    }

    pub fn update(&mut self, ctx: &PatternContext<'_>) {
        let region = *ctx.region;
        if ctx.is_animating {
            let step = ctx.animation_speed * self.options.animation_speed * ctx.delta_time;
            let mutation_rate = self.options.mutation_rate;
            let mutation_interval = self.options.mutation_interval_ms;
            let glyph_set = self.options.glyph_set.as_slice();
            for drop in &mut self.drops {
                drop.y += drop.speed * step;

                if drop.glyphs.is_empty()
                    || glyph_set.is_empty()
                    || ctx.time - drop.last_mutation_ms < mutation_interval
                {
                    continue;
                }
                if self.rng.random::<f32>() < mutation_rate {
                    let slot = self.rng.random_range(0..drop.glyphs.len());
                    drop.glyphs[slot] = glyph_set[self.rng.random_range(0..glyph_set.len())];
                    drop.last_mutation_ms = ctx.time;
                }
            }
        }

        for index in 0..self.drops.len() {
            let drop = &self.drops[index];
            if drop.y - drop.length as f32 > region.end_row as f32 {
                let recycled = self.spawn_drop(&region, false);
                self.drops[index] = recycled;
            }
        }

        self.reconcile_population(&region);
    }

    pub fn generate(&mut self, ctx: &PatternContext<'_>) -> Vec<CharacterData> {
        let region = ctx.region;
        if self.options.glyph_set.is_empty() || region.is_degenerate() {
            self.previous.clear();
            return Vec::new();
        }

        let mut current = Vec::new();
        for drop in &self.drops {
            let head_row = drop.y.floor() as i32;
            let length = drop.length.max(1) as f32;
            for (index, glyph) in drop.glyphs.iter().enumerate() {
                let row = head_row - index as i32;
                if !region.contains_cell(drop.column, row) {
                    continue;
                }
                let (x, y) = region.cell_origin(drop.column, row);
                let mut character = CharacterData::new(x, y, *glyph);
                if index == 0 {
                    character = character.with_color(self.options.head_color);
                } else {
                    if let Some(color) = self.options.color {
                        character = character.with_color(color);
                    }
                    if index >= SOLID_HEAD_GLYPHS {
                        character = character.with_opacity((1.0 - index as f32 / length).max(0.0));
                    }
                }
                current.push(character);
            }
        }

        // Trails exist only while drops move.
        let fade = self.options.fade_opacity;
        if !ctx.is_animating || fade <= 0.0 {
            self.previous.clear();
            return current;
        }
        let mut characters = Vec::with_capacity(self.previous.len() + current.len());
        characters.extend(self.previous.drain(..).map(|previous| {
            let opacity = previous.opacity * fade;
            previous.with_opacity(opacity)
        }));
        self.previous = current.clone();
        characters.extend(current);
        characters
    }

    fn reconcile_population(&mut self, region: &RenderRegion) {
        let target = self.target_population(region);
        if self.drops.len() > target {
            self.drops.truncate(target);
        }
        while self.drops.len() < target {
            let drop = self.spawn_drop(region, false);
            self.drops.push(drop);
        }
    }

    /// A fresh drop. Scattered drops start anywhere in the grid; others start above the top.
    fn spawn_drop(&mut self, region: &RenderRegion, scattered: bool) -> Drop {
        let options = &self.options;
        let rng = &mut self.rng;

        let length = if options.max_length > options.min_length {
            rng.random_range(options.min_length..=options.max_length)
        } else {
            options.min_length
        };
        let length = length.max(1);
        let speed = if options.min_speed.is_finite()
            && options.max_speed.is_finite()
            && options.max_speed > options.min_speed
        {
            rng.random_range(options.min_speed..options.max_speed)
        } else {
            options.min_speed
        };
        let column = if region.columns > 0 {
            region.start_column + rng.random_range(0..region.columns) as i32
        } else {
            region.start_column
        };
        let y = if scattered && region.end_row > region.start_row {
            rng.random_range(region.start_row..region.end_row) as f32
        } else {
            region.start_row as f32 - rng.random_range(0..=length) as f32
        };

        let glyph_set = options.glyph_set.as_slice();
        let glyphs = if glyph_set.is_empty() {
            Vec::new()
        } else {
            (0..length)
                .map(|_| glyph_set[rng.random_range(0..glyph_set.len())])
                .collect()
        };

        Drop {
            column,
            y,
            speed,
            length,
            glyphs,
            last_mutation_ms: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RainOptions, RainPattern};
    use crate::font::FontBook;
    use crate::options::Spacing;
    use crate::pattern::PatternContext;
    use crate::region::{compute_region, RenderRegion, SurfaceSize};

    fn region(width: u32, height: u32) -> RenderRegion {
        compute_region(
            SurfaceSize::new(width, height),
            10.0,
            &FontBook::new().face("mono"),
            &['x'],
            Spacing {
                x: Some(10.0),
                y: Some(10.0),
            },
            0,
        )
    }

    #[test]
    fn small_resize_keeps_drops_in_range() {
        let mut rain = RainPattern::new(RainOptions {
            density: 1.0,
            ..RainOptions::default()
        });
        rain.initialize(&region(100, 100));
        let speeds = rain.drops().iter().map(|drop| drop.speed).collect::<Vec<_>>();

        rain.initialize(&region(80, 100));
        assert_eq!(rain.drops().len(), 8);
        assert!(rain.drops().iter().all(|drop| (0..8).contains(&drop.column)));
        let kept = rain.drops().iter().map(|drop| drop.speed).collect::<Vec<_>>();
        assert_eq!(kept[..], speeds[..8]);
    }

    #[test]
    fn large_resize_rebuilds() {
        let mut rain = RainPattern::default();
        rain.initialize(&region(100, 100));
        rain.initialize(&region(300, 100));
        assert_eq!(rain.drops().len(), rain.target_population(&region(300, 100)));
        assert!(rain.drops().iter().all(|drop| (0..30).contains(&drop.column)));
    }

    #[test]
    fn head_uses_head_color_and_tail_fades() {
        let mut rain = RainPattern::new(RainOptions {
            density: 0.0,
            fade_opacity: 0.0,
            ..RainOptions::default()
        });
        let region = region(100, 200);
        rain.initialize(&region);
        rain.drops_mut().push(super::Drop {
            column: 2,
            y: 10.0,
            speed: 1.0,
            length: 5,
            glyphs: vec!['a', 'b', 'c', 'd', 'e'],
            last_mutation_ms: 0.0,
        });

        let characters = rain.generate(&PatternContext::still(&region));
        assert_eq!(characters.len(), 5);
        assert_eq!(characters[0].color, Some(rain.options().head_color));
        assert_eq!((characters[0].x, characters[0].y), (20.0, 100.0));
        assert_eq!(characters[1].opacity, 1.0);
        assert_eq!(characters[2].opacity, 1.0);
        assert!(characters[3].opacity < 1.0);
        assert!(characters[4].opacity < characters[3].opacity);
    }

    #[test]
    fn trail_re_emits_previous_frame_first() {
        let mut rain = RainPattern::new(RainOptions {
            density: 0.5,
            fade_opacity: 0.5,
            ..RainOptions::default()
        });
        let region = region(100, 100);
        rain.initialize(&region);
        let mut ctx = PatternContext::still(&region);
        ctx.is_animating = true;

        let first = rain.generate(&ctx);
        let second = rain.generate(&ctx);
        assert_eq!(second.len(), first.len() * 2);
        for (trail, original) in second.iter().zip(&first) {
            assert_eq!(trail.glyph, original.glyph);
            assert_eq!(trail.opacity, original.opacity * 0.5);
        }
    }

    #[test]
    fn frozen_frames_carry_no_trail() {
        let mut rain = RainPattern::new(RainOptions {
            density: 0.5,
            fade_opacity: 0.5,
            ..RainOptions::default()
        });
        let region = region(100, 100);
        rain.initialize(&region);
        let ctx = PatternContext::still(&region);

        let first = rain.generate(&ctx);
        assert!(!first.is_empty());
        assert_eq!(rain.generate(&ctx), first);
    }

    #[test]
    fn unbounded_options_degrade_without_panicking() {
        let region = region(100, 100);
        let mut rain = RainPattern::new(RainOptions {
            max_speed: f32::INFINITY,
            density: f32::INFINITY,
            ..RainOptions::default()
        });
        rain.initialize(&region);
        assert!(rain.drops().is_empty());

        rain.set_options(RainOptions {
            max_speed: f32::INFINITY,
            min_speed: f32::NAN,
            density: 1e30,
            ..RainOptions::default()
        });
        rain.initialize(&region);
        assert_eq!(rain.drops().len(), 100);
        let mut ctx = PatternContext::still(&region);
        ctx.is_animating = true;
        ctx.delta_time = 0.5;
        rain.update(&ctx);
        rain.generate(&ctx);
    }

    #[test]
    fn mutation_waits_for_the_interval() {
        let region = region(100, 100);
        let mut rain = RainPattern::new(RainOptions {
            glyph_set: crate::pattern::GlyphSet::from_text("ab"),
            mutation_rate: 1.0,
            mutation_interval_ms: 100.0,
            min_speed: 0.0,
            max_speed: 0.0,
            ..RainOptions::default()
        });
        rain.initialize(&region);
        assert!(!rain.drops().is_empty());
        for drop in rain.drops_mut() {
            drop.glyphs.iter_mut().for_each(|glyph| *glyph = 'z');
        }
        let mut ctx = PatternContext::still(&region);
        ctx.is_animating = true;
        let changed = |rain: &RainPattern| {
            rain.drops()
                .iter()
                .map(|drop| drop.glyphs.iter().filter(|glyph| **glyph != 'z').count())
                .collect::<Vec<_>>()
        };

        ctx.time = 50.0;
        rain.update(&ctx);
        assert!(changed(&rain).iter().all(|count| *count == 0));

        ctx.time = 150.0;
        rain.update(&ctx);
        assert!(changed(&rain).iter().all(|count| *count == 1));
        assert!(rain.drops().iter().all(|drop| drop.last_mutation_ms == 150.0));

        ctx.time = 200.0;
        rain.update(&ctx);
        assert!(changed(&rain).iter().all(|count| *count == 1));
    }

    #[test]
    fn empty_glyph_set_generates_nothing() {
        let mut rain = RainPattern::new(RainOptions {
            glyph_set: Default::default(),
            ..RainOptions::default()
        });
        let region = region(100, 100);
        rain.initialize(&region);
        let mut ctx = PatternContext::still(&region);
        ctx.is_animating = true;
        ctx.delta_time = 0.5;
        rain.update(&ctx);
        assert!(rain.generate(&ctx).is_empty());
    }
}
