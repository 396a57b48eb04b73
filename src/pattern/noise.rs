use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CharacterData, GlyphSet, PatternContext, ASCII_RAMP};
use crate::region::RenderRegion;

pub const ID: &str = "noise";

const TABLE_LEN: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NoiseOptions {
    pub glyph_set: GlyphSet,
    pub animation_speed: f32,
    pub frequency: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub seed: u64,
}

impl Default for NoiseOptions {
    fn default() -> Self {
        Self {
            glyph_set: GlyphSet::from_text(ASCII_RAMP),
            animation_speed: 1.0,
            frequency: 0.08,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            seed: 0,
        }
    }
}

/// Doubled byte permutation used to hash lattice corners.
#[derive(Clone, PartialEq, Eq)]
pub struct PermutationTable {
    seed: u64,
    values: [u8; TABLE_LEN],
}

impl std::fmt::Debug for PermutationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermutationTable")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl PermutationTable {
    pub fn new(seed: u64) -> Self {
        let mut base = [0_u8; 256];
        for (index, slot) in base.iter_mut().enumerate() {
            *slot = index as u8;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        for index in (1..base.len()).rev() {
            let swap_with = rng.random_range(0..=index);
            base.swap(index, swap_with);
        }

        let mut values = [0_u8; TABLE_LEN];
        for (index, slot) in values.iter_mut().enumerate() {
            *slot = base[index & 255];
        }
        Self { seed, values }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn values(&self) -> &[u8; TABLE_LEN] {
        &self.values
    }

    fn at(&self, index: usize) -> usize {
        usize::from(self.values[index])
    }

    /// Gradient noise at one point, roughly in `[-1, 1]`.
    pub fn noise3(&self, x: f32, y: f32, z: f32) -> f32 {
        let (xi, xf) = lattice(x);
        let (yi, yf) = lattice(y);
        let (zi, zf) = lattice(z);
        let u = fade(xf);
        let v = fade(yf);
        let w = fade(zf);

        let a = self.at(xi) + yi;
        let aa = self.at(a) + zi;
        let ab = self.at(a + 1) + zi;
        let b = self.at(xi + 1) + yi;
        let ba = self.at(b) + zi;
        let bb = self.at(b + 1) + zi;

        let near = lerp(
            v,
            lerp(
                u,
                grad(self.at(aa), xf, yf, zf),
                grad(self.at(ba), xf - 1.0, yf, zf),
            ),
            lerp(
                u,
                grad(self.at(ab), xf, yf - 1.0, zf),
                grad(self.at(bb), xf - 1.0, yf - 1.0, zf),
            ),
        );
        let far = lerp(
            v,
            lerp(
                u,
                grad(self.at(aa + 1), xf, yf, zf - 1.0),
                grad(self.at(ba + 1), xf - 1.0, yf, zf - 1.0),
            ),
            lerp(
                u,
                grad(self.at(ab + 1), xf, yf - 1.0, zf - 1.0),
                grad(self.at(bb + 1), xf - 1.0, yf - 1.0, zf - 1.0),
            ),
        );
        lerp(w, near, far)
    }

    /// Octave sum normalised by total amplitude and clamped to `[-1, 1]`.
    pub fn fractal(
        &self,
        x: f32,
        y: f32,
        z: f32,
        frequency: f32,
        octaves: u32,
        persistence: f32,
        lacunarity: f32,
    ) -> f32 {
        let mut total = 0.0_f32;
        let mut amplitude = 1.0_f32;
        let mut amplitude_sum = 0.0_f32;
        let mut octave_frequency = frequency;
        for _ in 0..octaves {
            total += self.noise3(x * octave_frequency, y * octave_frequency, z * octave_frequency)
                * amplitude;
            amplitude_sum += amplitude;
            amplitude *= persistence;
            octave_frequency *= lacunarity;
        }

        if amplitude_sum == 0.0 {
            return 0.0;
        }
        let value = total / amplitude_sum;
        if value.is_finite() {
            value.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

fn lattice(coordinate: f32) -> (usize, f32) {
    let floor = coordinate.floor();
    let cell = (floor as i64 & 255) as usize;
    (cell, coordinate - floor)
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

fn grad(hash: usize, x: f32, y: f32, z: f32) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

/// Fractal gradient noise mapped onto a glyph ramp.
#[derive(Debug, Clone)]
pub struct NoisePattern {
    options: NoiseOptions,
    table: PermutationTable,
    region: Option<RenderRegion>,
    pub(super) dirty: bool,
}

impl Default for NoisePattern {
    fn default() -> Self {
        Self::new(NoiseOptions::default())
    }
}

impl NoisePattern {
    pub fn new(options: NoiseOptions) -> Self {
        let table = PermutationTable::new(options.seed);
        Self {
            options,
            table,
            region: None,
            dirty: true,
        }
    }

    pub fn options(&self) -> &NoiseOptions {
        &self.options
    }

    pub fn table(&self) -> &PermutationTable {
        &self.table
    }

    pub fn region(&self) -> Option<&RenderRegion> {
        self.region.as_ref()
    }

    pub fn initialize(&mut self, region: &RenderRegion) {
        self.region = Some(*region);
        self.dirty = true;
    }

    pub fn set_options(&mut self, options: NoiseOptions) {
        if options.seed != self.table.seed() {
            debug!(seed = options.seed, "rebuilding noise permutation table");
            self.table = PermutationTable::new(options.seed);
        }
        self.options = options;
        self.dirty = true;
    }

    pub fn destroy(&mut self) {
        self.region = None;
    }

    /// Noise value for a grid cell at the given animation time.
    pub fn sample(&self, column: i32, row: i32, animation_time: f32) -> f32 {
        let NoiseOptions {
            frequency,
            octaves,
            persistence,
            lacunarity,
            animation_speed,
            ..
        } = self.options;
        self.table.fractal(
            column as f32,
            row as f32,
            animation_time * animation_speed,
            frequency,
            octaves,
            persistence,
            lacunarity,
        )
    }

    pub fn generate(&self, ctx: &PatternContext<'_>) -> Vec<CharacterData> {
        let region = ctx.region;
        let glyphs = &self.options.glyph_set;
        if glyphs.is_empty() || region.is_degenerate() {
            return Vec::new();
        }

        let mut characters = Vec::new();
        for row in region.start_row..region.end_row {
            for column in region.start_column..region.end_column {
                let normalized = (self.sample(column, row, ctx.animation_time) + 1.0) * 0.5;
                let Some(glyph) = glyphs.pick(normalized) else {
                    continue;
                };
                let (x, y) = region.cell_origin(column, row);
                characters.push(CharacterData::new(x, y, glyph).with_opacity(normalized));
            }
        }
        characters
    }
}

#[cfg(test)]
mod tests {
    use super::{NoiseOptions, NoisePattern, PermutationTable};

    #[test]
    fn table_is_a_doubled_permutation() {
        let table = PermutationTable::new(9);
        let values = table.values();
        let mut seen = [false; 256];
        for value in &values[..256] {
            seen[usize::from(*value)] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
        assert_eq!(values[..256], values[256..]);
    }

    #[test]
    fn different_seeds_shuffle_differently() {
        assert_ne!(PermutationTable::new(1), PermutationTable::new(2));
        assert_eq!(PermutationTable::new(5), PermutationTable::new(5));
    }

    #[test]
    fn lattice_points_are_zero() {
        let table = PermutationTable::new(0);
        assert_eq!(table.noise3(3.0, 7.0, 0.0), 0.0);
        assert_eq!(table.noise3(-2.0, 0.0, 11.0), 0.0);
    }

    #[test]
    fn zero_octaves_yield_zero() {
        let table = PermutationTable::new(0);
        assert_eq!(table.fractal(0.3, 0.7, 0.1, 1.0, 0, 0.5, 2.0), 0.0);
    }

    #[test]
    fn non_seed_edits_keep_the_table() {
        let mut pattern = NoisePattern::new(NoiseOptions {
            seed: 3,
            ..NoiseOptions::default()
        });
        let before = pattern.table().clone();

        pattern.set_options(NoiseOptions {
            seed: 3,
            frequency: 0.5,
            octaves: 2,
            ..NoiseOptions::default()
        });
        assert_eq!(pattern.table(), &before);

        pattern.set_options(NoiseOptions {
            seed: 4,
            ..NoiseOptions::default()
        });
        assert_ne!(pattern.table(), &before);
        assert_eq!(pattern.table().seed(), 4);
    }
}
