use anyhow::Result;

use super::{BackendStats, RenderBackend};
use crate::color::ColorRgba;
use crate::font::FontBook;
use crate::frame_hash::hash_characters;
use crate::options::{BackendKind, RendererOptions};
use crate::pattern::CharacterData;
use crate::region::{RenderRegion, SurfaceSize};

/// Records draw calls without producing pixels. Used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    size: Option<SurfaceSize>,
    stats: BackendStats,
    last_background: Option<ColorRgba>,
    last_frame: Vec<CharacterData>,
    frame_hashes: Vec<u64>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> Option<SurfaceSize> {
        self.size
    }

    pub fn last_background(&self) -> Option<ColorRgba> {
        self.last_background
    }

    pub fn last_frame(&self) -> &[CharacterData] {
        &self.last_frame
    }

    /// Content hash of every rendered frame, in order.
    pub fn frame_hashes(&self) -> &[u64] {
        &self.frame_hashes
    }
}

impl RenderBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    fn initialize(
        &mut self,
        size: SurfaceSize,
        _options: &RendererOptions,
        _fonts: &FontBook,
    ) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            anyhow::bail!(
                "cannot acquire a drawing surface of {}x{}",
                size.width,
                size.height
            );
        }
        self.size = Some(size);
        Ok(())
    }

    fn configure(&mut self, _options: &RendererOptions, _fonts: &FontBook) {}

    fn clear(&mut self, background: ColorRgba) -> Result<()> {
        self.last_background = Some(background);
        self.stats.clears += 1;
        Ok(())
    }

    fn render(&mut self, characters: &[CharacterData], _region: &RenderRegion) -> Result<()> {
        self.last_frame = characters.to_vec();
        self.frame_hashes.push(hash_characters(characters));
        self.stats.renders += 1;
        Ok(())
    }

    fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        self.size = Some(size);
        self.stats.resizes += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        self.size = None;
        self.last_frame.clear();
    }

    fn stats(&self) -> BackendStats {
        self.stats
    }

    fn read_rgba(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}
