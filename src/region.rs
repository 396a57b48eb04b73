use serde::{Deserialize, Serialize};

use crate::font::FontFace;
use crate::options::Spacing;

/// Minimum line height as a multiple of the font size.
const MIN_LINE_HEIGHT_RATIO: f32 = 1.2;
/// Glyphs that tend to be the widest in proportional and CJK-capable fonts.
const WIDE_SAMPLE_GLYPHS: [char; 6] = ['W', 'M', '@', '#', '█', 'ア'];
/// Upper bound on glyph-set members measured per recompute.
const GLYPH_SAMPLE_LIMIT: usize = 64;
const HEIGHT_SAMPLE_GLYPHS: [char; 4] = ['M', 'g', 'j', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Character grid laid over a surface.
///
/// `columns`/`rows` count the visible cells. The start/end bounds extend the
/// grid by the padding on every side; ends are exclusive, so the padded grid
/// covers `start_column..end_column` by `start_row..end_row`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderRegion {
    pub rows: u32,
    pub columns: u32,
    pub start_row: i32,
    pub end_row: i32,
    pub start_column: i32,
    pub end_column: i32,
    pub glyph_width: f32,
    pub glyph_height: f32,
    pub spacing_x: f32,
    pub spacing_y: f32,
    pub surface_width: u32,
    pub surface_height: u32,
}

impl RenderRegion {
    pub fn is_degenerate(&self) -> bool {
        self.rows == 0 || self.columns == 0
    }

    pub fn padding(&self) -> u32 {
        self.start_column.unsigned_abs()
    }

    /// True when the padded grid extends past the visible cells.
    pub fn has_padding(&self) -> bool {
        self.start_row < 0
            || self.start_column < 0
            || self.end_row > self.rows as i32
            || self.end_column > self.columns as i32
    }

    pub fn contains_cell(&self, column: i32, row: i32) -> bool {
        column >= self.start_column
            && column < self.end_column
            && row >= self.start_row
            && row < self.end_row
    }

    /// Pixel rectangle covered by the visible cells: `(x, y, width, height)`.
    pub fn visible_bounds(&self) -> (f32, f32, f32, f32) {
        (
            0.0,
            0.0,
            self.columns as f32 * self.spacing_x,
            self.rows as f32 * self.spacing_y,
        )
    }

    pub fn cell_origin(&self, column: i32, row: i32) -> (f32, f32) {
        (column as f32 * self.spacing_x, row as f32 * self.spacing_y)
    }
}

/// Derives the character grid for a surface from font metrics.
///
/// Pure in its inputs: identical arguments always produce an identical region.
pub fn compute_region(
    surface: SurfaceSize,
    font_size: f32,
    face: &FontFace,
    glyph_set: &[char],
    spacing: Spacing,
    padding: u32,
) -> RenderRegion {
    let sample = glyph_sample(glyph_set);

    let glyph_width = sample
        .iter()
        .map(|&glyph| face.advance_width(glyph, font_size))
        .fold(0.0_f32, f32::max)
        .ceil();
    let (ascent, descent) = face.vertical_extent(&HEIGHT_SAMPLE_GLYPHS, font_size);
    let glyph_height = (ascent + descent).ceil();
    let measured_spacing_y = glyph_height.max(font_size * MIN_LINE_HEIGHT_RATIO);

    let spacing_x = spacing
        .x
        .filter(|value| *value > 0.0)
        .unwrap_or(glyph_width);
    let spacing_y = spacing
        .y
        .filter(|value| *value > 0.0)
        .unwrap_or(measured_spacing_y);

    let columns = cells_along(surface.width, spacing_x);
    let rows = cells_along(surface.height, spacing_y);
    let pad = i32::try_from(padding).unwrap_or(i32::MAX / 4);

    RenderRegion {
        rows,
        columns,
        start_row: -pad,
        end_row: rows as i32 + pad,
        start_column: -pad,
        end_column: columns as i32 + pad,
        glyph_width,
        glyph_height,
        spacing_x,
        spacing_y,
        surface_width: surface.width,
        surface_height: surface.height,
    }
}

fn cells_along(extent: u32, spacing: f32) -> u32 {
    if !(spacing.is_finite() && spacing > 0.0) {
        return 0;
    }
    (extent as f32 / spacing).floor() as u32
}

fn glyph_sample(glyph_set: &[char]) -> Vec<char> {
    let mut sample = glyph_set
        .iter()
        .copied()
        .take(GLYPH_SAMPLE_LIMIT)
        .collect::<Vec<_>>();
    sample.extend(WIDE_SAMPLE_GLYPHS.iter().copied().filter(|glyph| {
        // Only sample wide glyphs the set could plausibly contain.
        glyph.is_ascii() || glyph_set.iter().any(|member| !member.is_ascii())
    }));
    sample
}
