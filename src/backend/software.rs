use anyhow::{anyhow, Result};
use tiny_skia::{
    BlendMode, FillRule, FilterQuality, Mask, PathBuilder, PixmapPaint, Rect, Transform,
};

use super::{BackendStats, RenderBackend};
use crate::color::ColorRgba;
use crate::font::FontBook;
use crate::glyph_painter::GlyphPainter;
use crate::options::{BackendKind, RendererOptions};
use crate::pattern::CharacterData;
use crate::region::{RenderRegion, SurfaceSize};
use crate::surface::Surface;

/// Baseline CPU backend drawing with tiny-skia.
#[derive(Default)]
pub struct SoftwareBackend {
    canvas: Option<GlyphCanvas>,
    stats: BackendStats,
    fallback_reason: Option<String>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback_reason(reason: String) -> Self {
        Self {
            fallback_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.canvas.as_ref().map(|canvas| &canvas.surface)
    }

    fn canvas_mut(&mut self) -> Result<&mut GlyphCanvas> {
        self.canvas
            .as_mut()
            .ok_or_else(|| anyhow!("software backend used before initialize"))
    }
}

impl RenderBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn initialize(
        &mut self,
        size: SurfaceSize,
        options: &RendererOptions,
        fonts: &FontBook,
    ) -> Result<()> {
        self.canvas = Some(GlyphCanvas::new(size, options, fonts)?);
        Ok(())
    }

    fn configure(&mut self, options: &RendererOptions, fonts: &FontBook) {
        if let Some(canvas) = &mut self.canvas {
            canvas.configure(options, fonts);
        }
    }

    fn clear(&mut self, background: ColorRgba) -> Result<()> {
        self.canvas_mut()?.surface.fill(background);
        self.stats.clears += 1;
        Ok(())
    }

    fn render(&mut self, characters: &[CharacterData], region: &RenderRegion) -> Result<()> {
        self.canvas_mut()?.draw(characters, region);
        self.stats.renders += 1;
        Ok(())
    }

    fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        self.canvas_mut()?.surface.resize(size)?;
        self.stats.resizes += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        self.canvas = None;
    }

    fn stats(&self) -> BackendStats {
        self.stats
    }

    fn read_rgba(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.surface().map(Surface::to_rgba))
    }

    fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }
}

/// Surface plus glyph rasterizer; the drawing core shared by the pixel backends.
pub struct GlyphCanvas {
    pub surface: Surface,
    painter: GlyphPainter,
    color: ColorRgba,
}

impl GlyphCanvas {
    pub fn new(size: SurfaceSize, options: &RendererOptions, fonts: &FontBook) -> Result<Self> {
        let surface = Surface::new(size)?;
        let painter = GlyphPainter::new(fonts.face(&options.font_family), options.font_size);
        Ok(Self {
            surface,
            painter,
            color: options.color,
        })
    }

    pub fn configure(&mut self, options: &RendererOptions, fonts: &FontBook) {
        self.color = options.color;
        self.painter
            .configure(&fonts.face(&options.font_family), options.font_size);
    }

    pub fn draw(&mut self, characters: &[CharacterData], region: &RenderRegion) {
        let clip = if region.has_padding() {
            visible_clip(&self.surface, region)
        } else {
            None
        };

        let width = self.surface.width() as f32;
        let height = self.surface.height() as f32;
        for character in characters {
            if !(character.x >= 0.0 && character.y >= 0.0 && character.x < width && character.y < height)
            {
                continue;
            }
            let opacity = character.opacity.clamp(0.0, 1.0);
            if opacity <= 0.0 {
                continue;
            }

            let bitmap = self.painter.glyph(character.glyph);
            if bitmap.is_empty() {
                continue;
            }
            let Some(tinted) = bitmap.tint(character.color.unwrap_or(self.color)) else {
                continue;
            };
            let transform = glyph_transform(character, region, bitmap.left, bitmap.top);
            let paint = PixmapPaint {
                opacity,
                blend_mode: BlendMode::SourceOver,
                quality: if character.has_transform() {
                    FilterQuality::Bilinear
                } else {
                    FilterQuality::Nearest
                },
            };
            self.surface.pixmap_mut().draw_pixmap(
                0,
                0,
                tinted.as_ref(),
                &paint,
                transform,
                clip.as_ref(),
            );
        }
    }
}

/// Places a glyph bitmap, scaling and rotating around the cell center when requested.
fn glyph_transform(character: &CharacterData, region: &RenderRegion, left: i32, top: i32) -> Transform {
    let offset_x = left as f32;
    let offset_y = top as f32;
    if !character.has_transform() {
        return Transform::from_translate(character.x + offset_x, character.y + offset_y);
    }
    let half_width = region.spacing_x * 0.5;
    let half_height = region.spacing_y * 0.5;
    Transform::from_translate(character.x + half_width, character.y + half_height)
        .pre_rotate(character.rotation)
        .pre_scale(character.scale, character.scale)
        .pre_translate(offset_x - half_width, offset_y - half_height)
}

fn visible_clip(surface: &Surface, region: &RenderRegion) -> Option<Mask> {
    let (x, y, width, height) = region.visible_bounds();
    let rect = Rect::from_xywh(x, y, width, height)?;
    let mut mask = Mask::new(surface.width(), surface.height())?;
    mask.fill_path(
        &PathBuilder::from_rect(rect),
        FillRule::Winding,
        false,
        Transform::identity(),
    );
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::SoftwareBackend;
    use crate::backend::RenderBackend;
    use crate::color::ColorRgba;
    use crate::font::FontBook;
    use crate::options::{RendererOptions, Spacing};
    use crate::pattern::CharacterData;
    use crate::region::{compute_region, RenderRegion, SurfaceSize};

    fn setup(width: u32, height: u32, padding: u32) -> (SoftwareBackend, RenderRegion) {
        let options = RendererOptions {
            font_size: 10.0,
            color: ColorRgba::WHITE,
            ..RendererOptions::default()
        };
        let fonts = FontBook::new();
        let mut backend = SoftwareBackend::new();
        backend
            .initialize(SurfaceSize::new(width, height), &options, &fonts)
            .expect("initialize");
        let region = compute_region(
            SurfaceSize::new(width, height),
            10.0,
            &fonts.face(&options.font_family),
            &['#'],
            Spacing {
                x: Some(10.0),
                y: Some(10.0),
            },
            padding,
        );
        (backend, region)
    }

    fn lit_pixels(backend: &SoftwareBackend) -> usize {
        backend
            .read_rgba()
            .expect("readback")
            .expect("software keeps pixels")
            .chunks(4)
            .filter(|pixel| pixel[0] > 0)
            .count()
    }

    #[test]
    fn draws_glyph_with_color_override() {
        let (mut backend, region) = setup(20, 20, 0);
        backend.clear(ColorRgba::BLACK).expect("clear");
        backend
            .render(
                &[CharacterData::new(0.0, 0.0, '#').with_color(ColorRgba::rgb(1.0, 0.0, 0.0))],
                &region,
            )
            .expect("render");

        let rgba = backend.read_rgba().expect("readback").expect("pixels");
        let red = rgba.chunks(4).filter(|pixel| pixel == &[255, 0, 0, 255]).count();
        assert!(red > 0);
        assert_eq!(backend.stats().renders, 1);
        assert_eq!(backend.stats().clears, 1);
    }

    #[test]
    fn characters_outside_surface_are_skipped() {
        let (mut backend, region) = setup(20, 20, 0);
        backend.clear(ColorRgba::BLACK).expect("clear");
        backend
            .render(
                &[
                    CharacterData::new(-10.0, 0.0, '#'),
                    CharacterData::new(0.0, 25.0, '#'),
                    CharacterData::new(20.0, 0.0, '#'),
                ],
                &region,
            )
            .expect("render");
        assert_eq!(lit_pixels(&backend), 0);
    }

    #[test]
    fn zero_opacity_draws_nothing() {
        let (mut backend, region) = setup(20, 20, 0);
        backend.clear(ColorRgba::BLACK).expect("clear");
        backend
            .render(&[CharacterData::new(0.0, 0.0, '#').with_opacity(0.0)], &region)
            .expect("render");
        assert_eq!(lit_pixels(&backend), 0);
    }

    #[test]
    fn padded_region_clips_to_visible_grid() {
        // 25px wide: two visible columns end at x = 20.
        let (mut backend, region) = setup(25, 10, 1);
        assert!(region.has_padding());
        backend.clear(ColorRgba::BLACK).expect("clear");
        backend
            .render(&[CharacterData::new(20.0, 0.0, '@').with_transform(2.0, 0.0)], &region)
            .expect("render");
        let rgba = backend.read_rgba().expect("readback").expect("pixels");
        for y in 0..10 {
            for x in 20..25 {
                let index = (y * 25 + x) * 4;
                assert_eq!(rgba[index], 0, "pixel ({x}, {y}) should be clipped");
            }
        }
    }

    #[test]
    fn rotation_keeps_glyph_near_its_cell() {
        let (mut backend, region) = setup(40, 40, 0);
        backend.clear(ColorRgba::BLACK).expect("clear");
        backend
            .render(&[CharacterData::new(10.0, 10.0, '#').with_transform(1.0, 90.0)], &region)
            .expect("render");
        let rgba = backend.read_rgba().expect("readback").expect("pixels");
        for (index, pixel) in rgba.chunks(4).enumerate() {
            if pixel[0] > 0 {
                let (x, y) = (index % 40, index / 40);
                assert!((2..=28).contains(&x) && (2..=28).contains(&y), "stray pixel at ({x}, {y})");
            }
        }
        assert!(lit_pixels(&backend) > 0);
    }
}
