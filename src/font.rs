use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fontdue::Font;
use unicode_width::UnicodeWidthChar;

const FALLBACK_ADVANCE_RATIO: f32 = 0.6;
const FALLBACK_ASCENT_RATIO: f32 = 0.8;
const FALLBACK_DESCENT_RATIO: f32 = 0.2;

/// Metrics provider for one font family.
///
/// Families registered in a [`FontBook`] are measured with fontdue. Anything
/// else gets a monospace approximation so that grids can always be laid out.
#[derive(Clone)]
pub enum FontFace {
    Fontdue { family: String, font: Arc<Font> },
    Fallback { family: String },
}

impl FontFace {
    pub fn family(&self) -> &str {
        match self {
            Self::Fontdue { family, .. } | Self::Fallback { family } => family,
        }
    }

    pub fn font(&self) -> Option<&Font> {
        match self {
            Self::Fontdue { font, .. } => Some(font.as_ref()),
            Self::Fallback { .. } => None,
        }
    }

    pub fn advance_width(&self, glyph: char, font_size: f32) -> f32 {
        match self {
            Self::Fontdue { font, .. } => font.metrics(glyph, font_size).advance_width,
            Self::Fallback { .. } => {
                let columns = glyph.width().unwrap_or(1).max(1) as f32;
                font_size * FALLBACK_ADVANCE_RATIO * columns
            }
        }
    }

    /// Ascent and descent (both positive) for the given glyph sample.
    pub fn vertical_extent(&self, sample: &[char], font_size: f32) -> (f32, f32) {
        match self {
            Self::Fontdue { font, .. } => {
                if let Some(line) = font.horizontal_line_metrics(font_size) {
                    return (line.ascent, -line.descent);
                }
                let mut ascent = 0.0_f32;
                let mut descent = 0.0_f32;
                for &glyph in sample {
                    let metrics = font.metrics(glyph, font_size);
                    ascent = ascent.max(metrics.height as f32 + metrics.ymin as f32);
                    descent = descent.max(-(metrics.ymin as f32));
                }
                (ascent, descent)
            }
            Self::Fallback { .. } => (
                font_size * FALLBACK_ASCENT_RATIO,
                font_size * FALLBACK_DESCENT_RATIO,
            ),
        }
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fontdue { family, .. } => write!(f, "FontFace::Fontdue({family})"),
            Self::Fallback { family } => write!(f, "FontFace::Fallback({family})"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FontBook {
    families: BTreeMap<String, FontFace>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bytes(&mut self, family: &str, bytes: Vec<u8>) -> Result<()> {
        let font = Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|error| anyhow!("failed to parse font for family '{family}': {error}"))?;
        self.families.insert(
            family.to_owned(),
            FontFace::Fontdue {
                family: family.to_owned(),
                font: Arc::new(font),
            },
        );
        Ok(())
    }

    pub fn register_file(&mut self, family: &str, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font file {}", path.display()))?;
        self.register_bytes(family, bytes)
            .with_context(|| format!("failed to load font file {}", path.display()))
    }

    pub fn contains(&self, family: &str) -> bool {
        self.families.contains_key(family)
    }

    pub fn face(&self, family: &str) -> FontFace {
        self.families
            .get(family)
            .cloned()
            .unwrap_or_else(|| FontFace::Fallback {
                family: family.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::FontBook;

    #[test]
    fn unknown_family_uses_monospace_fallback() {
        let book = FontBook::new();
        let face = book.face("Nope Mono");
        assert!(face.font().is_none());
        assert!((face.advance_width('A', 10.0) - 6.0).abs() < 1e-4);
        assert!((face.advance_width('ア', 10.0) - 12.0).abs() < 1e-4);
        let (ascent, descent) = face.vertical_extent(&['A'], 10.0);
        assert!((ascent - 8.0).abs() < 1e-4);
        assert!((descent - 2.0).abs() < 1e-4);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let mut book = FontBook::new();
        let error = book
            .register_bytes("Broken", vec![0, 1, 2, 3])
            .expect_err("invalid font should fail");
        assert!(error.to_string().contains("Broken"));
        assert!(!book.contains("Broken"));
    }
}
