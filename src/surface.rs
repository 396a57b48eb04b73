use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::{ImageFormat, RgbaImage};
use tiny_skia::Pixmap;

use crate::color::ColorRgba;
use crate::region::SurfaceSize;

/// RGBA raster the backends draw into.
#[derive(Debug, Clone)]
pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    /// Allocates the drawing surface. Fails for zero-area or oversized requests.
    pub fn new(size: SurfaceSize) -> Result<Self> {
        if size.width == 0 || size.height == 0 {
            bail!(
                "cannot acquire a drawing surface of {}x{}: both dimensions must be positive",
                size.width,
                size.height
            );
        }
        let pixmap = Pixmap::new(size.width, size.height).ok_or_else(|| {
            anyhow!(
                "failed to allocate drawing surface {}x{}",
                size.width,
                size.height
            )
        })?;
        Ok(Self { pixmap })
    }

    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.pixmap.width(), self.pixmap.height())
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    pub fn fill(&mut self, color: ColorRgba) {
        self.pixmap.fill(color.to_skia());
    }

    /// Reallocates at the new size. Contents are discarded.
    pub fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        if size == self.size() {
            return Ok(());
        }
        *self = Self::new(size).context("failed to resize drawing surface")?;
        Ok(())
    }

    /// Straight-alpha RGBA bytes, row-major.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixmap.pixels().len() * 4);
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            bytes.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        bytes
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        write_png(path, self.width(), self.height(), self.to_rgba())
    }
}

pub fn write_png(path: &Path, width: u32, height: u32, rgba: Vec<u8>) -> Result<()> {
    let image = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write PNG {}", path.display()))
}
