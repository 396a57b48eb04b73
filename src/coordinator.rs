use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{create_backend, RenderBackend};
use crate::control::{ControlHandle, ReadyUpdates};
use crate::font::FontBook;
use crate::frame_hash::hash_characters;
use crate::options::{OptionsPatch, RendererOptions, ResizeTarget};
use crate::pattern::{CharacterData, Pattern, PatternContext, PatternOptions, PatternRegistry, PointerState};
use crate::region::{compute_region, RenderRegion, SurfaceSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOutcome {
    Rendered,
    /// Output matched the previous frame and nothing asked for a redraw.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub frames: u64,
    pub renders: u64,
    pub skipped: u64,
}

/// Drives one pattern onto one backend.
///
/// Single-threaded: every mutation happens inside a method call, so a region is
/// always fully recomputed before the next frame reads it.
pub struct RenderCoordinator {
    options: RendererOptions,
    fonts: FontBook,
    registry: PatternRegistry,
    surface: SurfaceSize,
    region: RenderRegion,
    pattern: Pattern,
    backend: Box<dyn RenderBackend>,
    control: ControlHandle,
    animating: bool,
    dirty: bool,
    destroyed: bool,
    last_hash: Option<u64>,
    last_timestamp_ms: Option<f64>,
    animation_time: f32,
    pointer: Option<PointerState>,
    last_frame: Vec<CharacterData>,
    stats: FrameStats,
}

impl RenderCoordinator {
    /// Acquires a backend through [`create_backend`] and binds `pattern` to the surface.
    pub fn initialize(
        surface: SurfaceSize,
        pattern: Pattern,
        options: RendererOptions,
        fonts: FontBook,
    ) -> Result<Self> {
        let backend = create_backend(surface, &options, &fonts)?;
        Ok(Self::assemble(surface, pattern, options, fonts, backend))
    }

    /// Uses an injected backend, initializing it against `surface`.
    pub fn with_backend(
        surface: SurfaceSize,
        pattern: Pattern,
        options: RendererOptions,
        fonts: FontBook,
        mut backend: Box<dyn RenderBackend>,
    ) -> Result<Self> {
        backend.initialize(surface, &options, &fonts)?;
        Ok(Self::assemble(surface, pattern, options, fonts, backend))
    }

    fn assemble(
        surface: SurfaceSize,
        mut pattern: Pattern,
        options: RendererOptions,
        fonts: FontBook,
        backend: Box<dyn RenderBackend>,
    ) -> Self {
        let region = layout(surface, &options, &fonts, &pattern);
        pattern.initialize(&region);
        info!(
            pattern = pattern.id(),
            backend = backend.label(),
            columns = region.columns,
            rows = region.rows,
            "coordinator initialized"
        );

        let animated = options.animated;
        let mut coordinator = Self {
            options,
            fonts,
            registry: PatternRegistry::builtin(),
            surface,
            region,
            pattern,
            backend,
            control: ControlHandle::new(),
            animating: false,
            dirty: true,
            destroyed: false,
            last_hash: None,
            last_timestamp_ms: None,
            animation_time: 0.0,
            pointer: None,
            last_frame: Vec::new(),
            stats: FrameStats::default(),
        };
        if animated {
            coordinator.start_animation();
        }
        coordinator
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn region(&self) -> &RenderRegion {
        &self.region
    }

    pub fn surface_size(&self) -> SurfaceSize {
        self.surface
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PatternRegistry {
        &mut self.registry
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn animation_time(&self) -> f32 {
        self.animation_time
    }

    /// Characters produced by the most recent frame.
    pub fn last_frame(&self) -> &[CharacterData] {
        &self.last_frame
    }

    pub fn control_handle(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn read_rgba(&self) -> Result<Option<Vec<u8>>> {
        self.backend.read_rgba()
    }

    pub fn start_animation(&mut self) {
        if self.animating || self.destroyed {
            return;
        }
        self.animating = true;
        self.last_timestamp_ms = None;
        info!(pattern = self.pattern.id(), "animation started");
    }

    /// Stops scheduling frames; the last rendered frame stays on the surface.
    pub fn stop_animation(&mut self) {
        if !self.animating {
            return;
        }
        self.animating = false;
        info!(
            animation_time = self.animation_time,
            "animation stopped"
        );
    }

    /// Advances one frame at host time `timestamp_ms`.
    pub fn tick(&mut self, timestamp_ms: f64) -> Result<FrameOutcome> {
        self.ensure_live()?;
        self.apply_ready(timestamp_ms)?;

        let delta_ms = self
            .last_timestamp_ms
            .map(|last| (timestamp_ms - last).max(0.0))
            .unwrap_or(0.0);
        self.last_timestamp_ms = Some(timestamp_ms);
        let delta_time = (delta_ms / 1000.0) as f32;
        if self.animating {
            self.animation_time += delta_time * self.options.animation_speed;
        }

        self.stats.frames += 1;
        self.draw_frame(timestamp_ms, delta_time, false)
    }

    /// Draws the current state immediately, bypassing redraw suppression.
    pub fn render_once(&mut self) -> Result<()> {
        self.ensure_live()?;
        let time = self.last_timestamp_ms.unwrap_or(0.0);
        self.draw_frame(time, 0.0, true)?;
        Ok(())
    }

    /// Applies a partial option update, recomputing the layout.
    pub fn set_options(&mut self, patch: OptionsPatch) -> Result<()> {
        self.ensure_live()?;
        self.apply_options(patch)?;
        self.sync_static()
    }

    /// Swaps in a new pattern and returns the outgoing one, already destroyed.
    pub fn set_pattern(&mut self, pattern: Pattern) -> Result<Pattern> {
        self.ensure_live()?;
        let outgoing = self.apply_pattern(pattern);
        self.sync_static()?;
        Ok(outgoing)
    }

    /// Builds a pattern from the registry by key and swaps it in.
    pub fn set_pattern_by_name(
        &mut self,
        key: &str,
        options: Option<&PatternOptions>,
    ) -> Result<Pattern> {
        let pattern = self.registry.create(key, options)?;
        self.set_pattern(pattern)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.ensure_live()?;
        self.apply_resize(SurfaceSize::new(width, height))?;
        self.sync_static()
    }

    /// Applies queued commands now instead of at the next tick.
    pub fn flush_commands(&mut self, now_ms: f64) -> Result<()> {
        self.ensure_live()?;
        if self.apply_ready(now_ms)? {
            self.sync_static()?;
        }
        Ok(())
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop_animation();
        self.pattern.destroy();
        self.backend.destroy();
        self.last_frame.clear();
        self.destroyed = true;
        info!("coordinator destroyed");
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            bail!("render coordinator used after destroy");
        }
        Ok(())
    }

    /// Re-renders right away when no animation loop will pick the change up.
    fn sync_static(&mut self) -> Result<()> {
        if !self.animating {
            self.render_once()?;
        }
        Ok(())
    }

    fn relayout(&mut self) {
        self.region = layout(self.surface, &self.options, &self.fonts, &self.pattern);
        self.pattern.initialize(&self.region);
        self.dirty = true;
        debug!(
            columns = self.region.columns,
            rows = self.region.rows,
            spacing_x = self.region.spacing_x,
            spacing_y = self.region.spacing_y,
            "region recomputed"
        );
    }

    fn apply_options(&mut self, patch: OptionsPatch) -> Result<()> {
        let previous_backend = self.options.backend;
        self.options.apply(&patch);

        let mut swapped = false;
        if let Some(pattern_options) = &patch.pattern {
            if !self.pattern.set_options(pattern_options) {
                self.apply_pattern(Pattern::from(pattern_options.clone()));
                swapped = true;
            }
        }

        if self.options.backend != previous_backend {
            self.backend.destroy();
            self.backend = create_backend(self.surface, &self.options, &self.fonts)?;
            info!(backend = self.backend.label(), "backend switched");
        } else {
            self.backend.configure(&self.options, &self.fonts);
        }

        if let Some(animated) = patch.animated {
            if animated {
                self.start_animation();
            } else {
                self.stop_animation();
            }
        }

        // Glyph sets and padding live in pattern options, so any pattern block can move the grid.
        if patch.affects_layout() || (patch.pattern.is_some() && !swapped) {
            self.relayout();
        } else {
            self.dirty = true;
        }
        Ok(())
    }

    fn apply_pattern(&mut self, pattern: Pattern) -> Pattern {
        let mut outgoing = std::mem::replace(&mut self.pattern, pattern);
        outgoing.destroy();
        info!(from = outgoing.id(), to = self.pattern.id(), "pattern swapped");
        self.last_hash = None;
        self.relayout();
        outgoing
    }

    fn apply_resize(&mut self, size: SurfaceSize) -> Result<()> {
        self.backend.resize(size)?;
        self.surface = size;
        self.relayout();
        Ok(())
    }

    /// Applies whatever the control handle has ready. Returns whether anything changed.
    fn apply_ready(&mut self, now_ms: f64) -> Result<bool> {
        let ReadyUpdates {
            patch,
            pattern,
            resize,
            animating,
            render_requested,
            pointer,
        } = self.control.take_ready(now_ms, self.options.debounce_ms);
        let mut changed = render_requested;

        if let Some(size) = resize {
            match self.options.resize_to {
                ResizeTarget::Surface if size != self.surface => {
                    self.apply_resize(size)?;
                    changed = true;
                }
                ResizeTarget::Surface => {}
                ResizeTarget::Fixed => warn!(
                    width = size.width,
                    height = size.height,
                    "ignoring resize notification for fixed-size target"
                ),
            }
        }
        if let Some(pattern) = pattern {
            self.apply_pattern(pattern);
            changed = true;
        }
        if let Some(patch) = patch.filter(|patch| !patch.is_empty()) {
            self.apply_options(patch)?;
            changed = true;
        }
        match animating {
            Some(true) => self.start_animation(),
            Some(false) => self.stop_animation(),
            None => {}
        }
        if let Some(pointer) = pointer {
            self.pointer = Some(pointer);
            self.dirty = true;
        }
        if render_requested {
            self.dirty = true;
        }
        Ok(changed)
    }

    fn draw_frame(&mut self, time: f64, delta_time: f32, force: bool) -> Result<FrameOutcome> {
        let ctx = PatternContext {
            time,
            delta_time,
            animation_time: self.animation_time,
            is_animating: self.animating,
            animation_speed: self.options.animation_speed,
            region: &self.region,
            pointer: self.pointer,
        };
        self.pattern.update(&ctx);
        let characters = self.pattern.generate(&ctx);
        let hash = hash_characters(&characters);
        let pattern_dirty = self.pattern.take_dirty();
        let full_clear = self.animating && self.pattern.requires_full_clear();

        // Clicks are visible for exactly one frame.
        if let Some(pointer) = &mut self.pointer {
            pointer.clicked = false;
        }

        if !force && !self.dirty && !pattern_dirty && !full_clear && self.last_hash == Some(hash) {
            self.stats.skipped += 1;
            debug!(hash, "frame unchanged; skipping draw");
            return Ok(FrameOutcome::Skipped);
        }

        self.backend.clear(self.options.background_color)?;
        self.backend.render(&characters, &self.region)?;
        self.last_hash = Some(hash);
        self.last_frame = characters;
        self.dirty = false;
        self.stats.renders += 1;
        Ok(FrameOutcome::Rendered)
    }
}

fn layout(
    surface: SurfaceSize,
    options: &RendererOptions,
    fonts: &FontBook,
    pattern: &Pattern,
) -> RenderRegion {
    let padding = options
        .padding
        .unwrap_or_else(|| pattern.recommended_padding());
    compute_region(
        surface,
        options.font_size,
        &fonts.face(&options.font_family),
        pattern.glyph_set().as_slice(),
        options.spacing,
        padding,
    )
}

#[cfg(test)]
mod tests {
    use super::{FrameOutcome, RenderCoordinator};
    use crate::backend::HeadlessBackend;
    use crate::font::FontBook;
    use crate::options::{OptionsPatch, RendererOptions, ResizeTarget};
    use crate::pattern::{NoisePattern, Pattern};
    use crate::region::SurfaceSize;

    fn coordinator(options: RendererOptions) -> RenderCoordinator {
        RenderCoordinator::with_backend(
            SurfaceSize::new(120, 60),
            Pattern::Noise(NoisePattern::default()),
            options,
            FontBook::new(),
            Box::new(HeadlessBackend::new()),
        )
        .expect("coordinator")
    }

    fn still() -> RendererOptions {
        RendererOptions {
            animated: false,
            font_size: 10.0,
            ..RendererOptions::default()
        }
    }

    #[test]
    fn animation_time_accumulates_scaled_delta() {
        let mut coordinator = coordinator(RendererOptions {
            animation_speed: 2.0,
            ..still()
        });
        coordinator.start_animation();
        coordinator.tick(1_000.0).expect("tick");
        coordinator.tick(1_500.0).expect("tick");
        assert!((coordinator.animation_time() - 1.0).abs() < 1e-6);

        coordinator.stop_animation();
        coordinator.tick(2_500.0).expect("tick");
        assert!((coordinator.animation_time() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn destroyed_coordinator_refuses_ticks() {
        let mut coordinator = coordinator(still());
        coordinator.destroy();
        assert!(coordinator.tick(0.0).is_err());
        assert!(!coordinator.is_animating());
    }

    #[test]
    fn fixed_target_ignores_host_resize() {
        let mut coordinator = coordinator(RendererOptions {
            resize_to: ResizeTarget::Fixed,
            ..still()
        });
        let before = *coordinator.region();
        coordinator.control_handle().resize(400, 400);
        coordinator.flush_commands(0.0).expect("flush");
        assert_eq!(coordinator.region(), &before);

        coordinator.resize(240, 60).expect("explicit resize still applies");
        assert_eq!(coordinator.region().columns, before.columns * 2);
    }

    #[test]
    fn pattern_options_of_another_kind_swap_the_pattern() {
        let mut coordinator = coordinator(still());
        let patch: OptionsPatch =
            serde_yaml::from_str("pattern:\n  kind: cell_noise\n  seed: 4\n").expect("patch");
        coordinator.set_options(patch).expect("set options");
        assert_eq!(coordinator.pattern().id(), "cell_noise");
        assert_eq!(coordinator.backend().stats().renders, 1);
    }

    #[test]
    fn queued_render_request_forces_a_frame() {
        let mut coordinator = coordinator(still());
        assert_eq!(coordinator.tick(0.0).expect("tick"), FrameOutcome::Rendered);
        assert_eq!(coordinator.tick(0.0).expect("tick"), FrameOutcome::Skipped);
        coordinator.control_handle().request_render();
        assert_eq!(coordinator.tick(0.0).expect("tick"), FrameOutcome::Rendered);
    }
}
