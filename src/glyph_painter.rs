use std::collections::HashMap;

use tiny_skia::{IntSize, Pixmap};

use crate::color::ColorRgba;
use crate::font::FontFace;

/// Coverage mask for one glyph, placed relative to its cell's top-left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    pub left: i32,
    pub top: i32,
    pub coverage: Vec<u8>,
}

impl GlyphBitmap {
    fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            left: 0,
            top: 0,
            coverage: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.coverage.iter().all(|value| *value == 0)
    }

    /// Colors the mask into a premultiplied pixmap.
    pub fn tint(&self, color: ColorRgba) -> Option<Pixmap> {
        let size = IntSize::from_wh(self.width as u32, self.height as u32)?;
        let [r, g, b, a] = color.to_rgba8();
        let mut data = Vec::with_capacity(self.coverage.len() * 4);
        for mask in &self.coverage {
            let alpha = (u16::from(*mask) * u16::from(a) / 255) as u8;
            let premultiply = |channel: u8| (u16::from(channel) * u16::from(alpha) / 255) as u8;
            data.extend_from_slice(&[premultiply(r), premultiply(g), premultiply(b), alpha]);
        }
        Pixmap::from_vec(data, size)
    }
}

/// Rasterizes glyphs for one face and size, caching coverage per glyph.
pub struct GlyphPainter {
    face: FontFace,
    font_size: f32,
    ascent: f32,
    cache: HashMap<char, GlyphBitmap>,
}

impl GlyphPainter {
    pub fn new(face: FontFace, font_size: f32) -> Self {
        let (ascent, _) = face.vertical_extent(&['M'], font_size);
        Self {
            face,
            font_size,
            ascent,
            cache: HashMap::new(),
        }
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn cached_glyphs(&self) -> usize {
        self.cache.len()
    }

    /// Switches face or size; the cache survives when neither changes.
    pub fn configure(&mut self, face: &FontFace, font_size: f32) {
        if face.family() == self.face.family()
            && (self.font_size - font_size).abs() <= f32::EPSILON
        {
            return;
        }
        *self = Self::new(face.clone(), font_size);
    }

    pub fn glyph(&mut self, glyph: char) -> &GlyphBitmap {
        let face = &self.face;
        let font_size = self.font_size;
        let ascent = self.ascent;
        self.cache
            .entry(glyph)
            .or_insert_with(|| rasterize(face, glyph, font_size, ascent))
    }
}

fn rasterize(face: &FontFace, glyph: char, font_size: f32, ascent: f32) -> GlyphBitmap {
    if glyph.is_whitespace() || glyph.is_control() {
        return GlyphBitmap::empty();
    }
    match face.font() {
        Some(font) => {
            let (metrics, coverage) = font.rasterize(glyph, font_size);
            GlyphBitmap {
                width: metrics.width,
                height: metrics.height,
                left: metrics.xmin,
                top: (ascent - (metrics.ymin as f32 + metrics.height as f32)).round() as i32,
                coverage,
            }
        }
        None => block_glyph(face, glyph, font_size, ascent),
    }
}

/// Columns and rows of the procedural block grid.
const BLOCK_COLUMNS: usize = 3;
const BLOCK_ROWS: usize = 5;

/// Stand-in glyph drawn without a font file: a 3x5 block pattern derived from the code point,
/// so distinct glyphs stay visually distinct.
fn block_glyph(face: &FontFace, glyph: char, font_size: f32, ascent: f32) -> GlyphBitmap {
    let width = face.advance_width(glyph, font_size).floor().max(1.0) as usize;
    let height = ascent.ceil().max(1.0) as usize;
    let bits = block_bits(glyph);

    let mut coverage = vec![0_u8; width * height];
    for y in 0..height {
        let block_row = y * BLOCK_ROWS / height;
        for x in 0..width {
            let block_column = x * BLOCK_COLUMNS / width;
            if bits & (1 << (block_row * BLOCK_COLUMNS + block_column)) != 0 {
                coverage[y * width + x] = 255;
            }
        }
    }

    GlyphBitmap {
        width,
        height,
        left: 0,
        top: 0,
        coverage,
    }
}

fn block_bits(glyph: char) -> u16 {
    let mut hash = u32::from(glyph).wrapping_mul(0x9e37_79b1);
    hash ^= hash >> 15;
    let bits = (hash & 0x7fff) as u16;
    // Never blank, so every visible glyph leaves a mark.
    if bits == 0 {
        0b010_010_010_010_010
    } else {
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::GlyphPainter;
    use crate::color::ColorRgba;
    use crate::font::FontBook;

    #[test]
    fn fallback_glyphs_fill_their_cell() {
        let mut painter = GlyphPainter::new(FontBook::new().face("mono"), 10.0);
        let bitmap = painter.glyph('#').clone();
        assert_eq!((bitmap.width, bitmap.height), (6, 8));
        assert!(!bitmap.is_empty());
        assert!(painter.glyph(' ').is_empty());
        assert_eq!(painter.cached_glyphs(), 2);
    }

    #[test]
    fn distinct_glyphs_get_distinct_blocks() {
        let mut painter = GlyphPainter::new(FontBook::new().face("mono"), 20.0);
        let a = painter.glyph('a').coverage.clone();
        let b = painter.glyph('b').coverage.clone();
        assert_ne!(a, b);
    }

    #[test]
    fn tint_premultiplies_color() {
        let mut painter = GlyphPainter::new(FontBook::new().face("mono"), 10.0);
        let pixmap = painter
            .glyph('@')
            .tint(ColorRgba::from_rgba8(255, 0, 0, 128))
            .expect("tinted pixmap");
        let lit = pixmap
            .pixels()
            .iter()
            .find(|pixel| pixel.alpha() > 0)
            .expect("some covered pixel");
        assert_eq!(lit.alpha(), 128);
        assert_eq!(lit.red(), 128);
        assert_eq!(lit.green(), 0);
    }

    #[test]
    fn configure_resets_cache_on_size_change() {
        let book = FontBook::new();
        let mut painter = GlyphPainter::new(book.face("mono"), 10.0);
        painter.glyph('x');
        painter.configure(&book.face("mono"), 10.0);
        assert_eq!(painter.cached_glyphs(), 1);
        painter.configure(&book.face("mono"), 12.0);
        assert_eq!(painter.cached_glyphs(), 0);
    }
}
