//! Procedural character-grid rendering.
//!
//! A [`RenderCoordinator`] lays a character grid over a surface, drives one
//! [`Pattern`] per frame and hands the resulting glyphs to a [`RenderBackend`].

pub mod backend;
pub mod color;
pub mod control;
pub mod coordinator;
pub mod font;
pub mod frame_hash;
pub mod frame_text;
pub mod glyph_painter;
pub mod logging;
pub mod options;
pub mod pattern;
pub mod region;
pub mod scene;
pub mod surface;

pub use backend::{create_backend, BackendStats, RenderBackend};
pub use color::ColorRgba;
pub use control::{Command, ControlHandle};
pub use coordinator::{FrameOutcome, FrameStats, RenderCoordinator};
pub use font::{FontBook, FontFace};
pub use options::{BackendKind, OptionsPatch, RendererOptions, ResizeTarget, Spacing};
pub use pattern::{CharacterData, Pattern, PatternContext, PatternOptions, PatternRegistry};
pub use region::{compute_region, RenderRegion, SurfaceSize};
