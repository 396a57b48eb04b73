use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::coordinator::RenderCoordinator;
use crate::font::FontBook;
use crate::options::{OptionsPatch, RendererOptions};
use crate::pattern::{NoiseOptions, Pattern, PatternOptions};
use crate::region::SurfaceSize;

/// A renderable scene: surface, options, pattern and a frame timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub surface: SurfaceSize,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_frames")]
    pub frames: u32,
    #[serde(default)]
    pub renderer: RendererOptions,
    #[serde(default = "default_pattern")]
    pub pattern: PatternOptions,
    #[serde(default)]
    pub fonts: Vec<FontEntry>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    /// Directory relative font paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FontEntry {
    pub family: String,
    pub path: PathBuf,
}

/// Option patch applied before the given frame is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelineEvent {
    pub at_frame: u32,
    pub set: OptionsPatch,
}

fn default_fps() -> u32 {
    30
}

fn default_frames() -> u32 {
    1
}

fn default_pattern() -> PatternOptions {
    PatternOptions::Noise(NoiseOptions::default())
}

pub fn load_and_validate_scene(path: &Path) -> Result<Scene> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    let base_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    parse_scene(&contents, base_dir)
        .with_context(|| format!("invalid scene {}", path.display()))
}

/// Parses and validates scene YAML; font paths resolve against `base_dir`.
pub fn parse_scene(contents: &str, base_dir: PathBuf) -> Result<Scene> {
    let mut scene: Scene = serde_yaml::from_str(contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!("failed to parse yaml at {}: {}", location, error)
    })?;
    scene.base_dir = base_dir;
    scene.validate()?;
    scene.timeline.sort_by_key(|event| event.at_frame);
    Ok(scene)
}

impl Scene {
    /// Structural checks only; numeric pattern options are taken as given.
    pub fn validate(&self) -> Result<()> {
        if self.surface.width == 0 || self.surface.height == 0 {
            bail!(
                "surface must have a positive size (got {}x{})",
                self.surface.width,
                self.surface.height
            );
        }
        if self.fps == 0 {
            bail!("fps must be greater than zero");
        }
        if self.frames == 0 {
            bail!("frames must be greater than zero");
        }
        if !self.renderer.font_size.is_finite() || self.renderer.font_size <= 0.0 {
            bail!(
                "renderer.font_size must be a positive number (got {})",
                self.renderer.font_size
            );
        }
        self.renderer.color.validate("renderer.color")?;
        self.renderer
            .background_color
            .validate("renderer.background_color")?;

        let mut families = HashSet::with_capacity(self.fonts.len());
        for font in &self.fonts {
            if font.family.trim().is_empty() {
                bail!("font family names must not be empty");
            }
            if !families.insert(font.family.as_str()) {
                bail!("font family '{}' is declared twice", font.family);
            }
            let resolved = self.resolve(&font.path);
            if !resolved.is_file() {
                bail!(
                    "font file for family '{}' not found: {}",
                    font.family,
                    resolved.display()
                );
            }
        }

        for event in &self.timeline {
            if event.at_frame >= self.frames {
                bail!(
                    "timeline event at frame {} is past the last frame ({})",
                    event.at_frame,
                    self.frames - 1
                );
            }
        }
        Ok(())
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn font_book(&self) -> Result<FontBook> {
        let mut book = FontBook::new();
        for font in &self.fonts {
            book.register_file(&font.family, &self.resolve(&font.path))?;
        }
        Ok(book)
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::from(self.pattern.clone())
    }

    /// Host timestamp for a frame index at the scene's frame rate.
    pub fn frame_timestamp_ms(&self, frame_index: u32) -> f64 {
        f64::from(frame_index) * 1000.0 / f64::from(self.fps)
    }

    pub fn events_at(&self, frame_index: u32) -> impl Iterator<Item = &TimelineEvent> {
        self.timeline
            .iter()
            .filter(move |event| event.at_frame == frame_index)
    }

    pub fn build_coordinator(&self) -> Result<RenderCoordinator> {
        RenderCoordinator::initialize(
            self.surface,
            self.pattern(),
            self.renderer.clone(),
            self.font_book()?,
        )
    }
}
