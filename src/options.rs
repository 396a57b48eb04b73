use serde::{Deserialize, Deserializer, Serialize};

use crate::color::ColorRgba;
use crate::pattern::PatternOptions;

pub const DEFAULT_FONT_FAMILY: &str = "monospace";
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Software,
    Accelerated,
    Headless,
}

impl BackendKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Accelerated => "accelerated",
            Self::Headless => "headless",
        }
    }
}

/// Which resize notifications the coordinator follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeTarget {
    /// Follow host resize notifications.
    #[default]
    Surface,
    /// Keep the initial surface size; only explicit `resize` calls apply.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Spacing {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RendererOptions {
    pub color: ColorRgba,
    pub background_color: ColorRgba,
    pub font_size: f32,
    pub font_family: String,
    pub backend: BackendKind,
    /// Extra cells around the visible grid; `None` uses the pattern's recommendation.
    pub padding: Option<u32>,
    pub spacing: Spacing,
    pub animated: bool,
    pub animation_speed: f32,
    pub resize_to: ResizeTarget,
    pub debounce_ms: u64,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            color: ColorRgba::from_rgba8(0, 255, 102, 255),
            background_color: ColorRgba::BLACK,
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_owned(),
            backend: BackendKind::Software,
            padding: None,
            spacing: Spacing::default(),
            animated: true,
            animation_speed: 1.0,
            resize_to: ResizeTarget::Surface,
            debounce_ms: 0,
        }
    }
}

/// Partial update for [`RendererOptions`]; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OptionsPatch {
    pub color: Option<ColorRgba>,
    pub background_color: Option<ColorRgba>,
    pub font_size: Option<f32>,
    pub font_family: Option<String>,
    pub backend: Option<BackendKind>,
    /// `null` resets to the pattern's recommendation.
    #[serde(default, deserialize_with = "present")]
    pub padding: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present")]
    pub spacing_x: Option<Option<f32>>,
    #[serde(default, deserialize_with = "present")]
    pub spacing_y: Option<Option<f32>>,
    pub animated: Option<bool>,
    pub animation_speed: Option<f32>,
    pub resize_to: Option<ResizeTarget>,
    pub debounce_ms: Option<u64>,
    pub pattern: Option<PatternOptions>,
}

/// Keeps an explicit `null` distinct from an absent field.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl OptionsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Layers `later` over `self`; fields present in `later` win.
    pub fn merge(&mut self, later: OptionsPatch) {
        macro_rules! take_later {
            ($($field:ident),* $(,)?) => {
                $(if later.$field.is_some() { self.$field = later.$field; })*
            };
        }
        take_later!(
            color,
            background_color,
            font_size,
            font_family,
            backend,
            padding,
            spacing_x,
            spacing_y,
            animated,
            animation_speed,
            resize_to,
            debounce_ms,
            pattern,
        );
    }

    /// True when applying the patch can change the character grid.
    pub fn affects_layout(&self) -> bool {
        self.font_size.is_some()
            || self.font_family.is_some()
            || self.padding.is_some()
            || self.spacing_x.is_some()
            || self.spacing_y.is_some()
    }
}

impl RendererOptions {
    /// Applies the renderer fields of a patch. The pattern block is handled by the coordinator.
    pub fn apply(&mut self, patch: &OptionsPatch) {
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(background) = patch.background_color {
            self.background_color = background;
        }
        if let Some(font_size) = patch.font_size {
            self.font_size = font_size;
        }
        if let Some(font_family) = &patch.font_family {
            self.font_family = font_family.clone();
        }
        if let Some(backend) = patch.backend {
            self.backend = backend;
        }
        if let Some(padding) = patch.padding {
            self.padding = padding;
        }
        if let Some(spacing_x) = patch.spacing_x {
            self.spacing.x = spacing_x;
        }
        if let Some(spacing_y) = patch.spacing_y {
            self.spacing.y = spacing_y;
        }
        if let Some(animated) = patch.animated {
            self.animated = animated;
        }
        if let Some(speed) = patch.animation_speed {
            self.animation_speed = speed;
        }
        if let Some(resize_to) = patch.resize_to {
            self.resize_to = resize_to;
        }
        if let Some(debounce_ms) = patch.debounce_ms {
            self.debounce_ms = debounce_ms;
        }
    }
}
