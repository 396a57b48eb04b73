pub mod accelerated;
pub mod headless;
pub mod software;

use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::color::ColorRgba;
use crate::font::FontBook;
use crate::options::{BackendKind, RendererOptions};
use crate::pattern::CharacterData;
use crate::region::{RenderRegion, SurfaceSize};

pub use accelerated::AcceleratedBackend;
pub use headless::HeadlessBackend;
pub use software::SoftwareBackend;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendStats {
    pub clears: u64,
    pub renders: u64,
    pub resizes: u64,
}

/// Draws positioned characters onto a surface.
///
/// Implementations must skip characters outside the surface, clip to the visible
/// grid when the region is padded, and honor per-character color, opacity and transform.
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    /// Acquires the drawing surface. Failure here is fatal to the caller.
    fn initialize(
        &mut self,
        size: SurfaceSize,
        options: &RendererOptions,
        fonts: &FontBook,
    ) -> Result<()>;

    /// Picks up color and font changes without reallocating the surface.
    fn configure(&mut self, options: &RendererOptions, fonts: &FontBook);

    fn clear(&mut self, background: ColorRgba) -> Result<()>;

    fn render(&mut self, characters: &[CharacterData], region: &RenderRegion) -> Result<()>;

    fn resize(&mut self, size: SurfaceSize) -> Result<()>;

    fn destroy(&mut self);

    fn stats(&self) -> BackendStats;

    /// Straight-alpha RGBA of the last frame, if the backend keeps pixels.
    fn read_rgba(&self) -> Result<Option<Vec<u8>>>;

    /// Why a requested backend was replaced by this one.
    fn fallback_reason(&self) -> Option<&str> {
        None
    }

    fn label(&self) -> &'static str {
        self.kind().label()
    }
}

/// Builds and initializes the backend for `options.backend`.
///
/// An accelerated request that fails or panics during setup silently degrades to
/// the software backend; only surface acquisition errors reach the caller.
pub fn create_backend(
    size: SurfaceSize,
    options: &RendererOptions,
    fonts: &FontBook,
) -> Result<Box<dyn RenderBackend>> {
    create_backend_with(size, options, fonts, || {
        let backend = AcceleratedBackend::new(size, options, fonts)?;
        Ok(Box::new(backend) as Box<dyn RenderBackend>)
    })
}

/// Same as [`create_backend`] with an injectable accelerated constructor.
pub fn create_backend_with<F>(
    size: SurfaceSize,
    options: &RendererOptions,
    fonts: &FontBook,
    accelerated: F,
) -> Result<Box<dyn RenderBackend>>
where
    F: FnOnce() -> Result<Box<dyn RenderBackend>>,
{
    let mut backend: Box<dyn RenderBackend> = match options.backend {
        BackendKind::Software => Box::new(SoftwareBackend::new()),
        BackendKind::Headless => Box::new(HeadlessBackend::new()),
        BackendKind::Accelerated => match try_accelerated(accelerated) {
            Ok(backend) => {
                info!(backend = backend.label(), "accelerated backend ready");
                return Ok(backend);
            }
            Err(error) => {
                let reason = format!("{error:#}");
                warn!(%reason, "accelerated backend unavailable; using software backend");
                Box::new(SoftwareBackend::with_fallback_reason(reason))
            }
        },
    };
    backend.initialize(size, options, fonts)?;
    Ok(backend)
}

fn try_accelerated<F>(accelerated: F) -> Result<Box<dyn RenderBackend>>
where
    F: FnOnce() -> Result<Box<dyn RenderBackend>>,
{
    match catch_unwind(AssertUnwindSafe(accelerated)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|message| (*message).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            Err(anyhow!("accelerated backend panicked during setup: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::{create_backend_with, HeadlessBackend, RenderBackend};
    use crate::font::FontBook;
    use crate::options::{BackendKind, RendererOptions};
    use crate::region::SurfaceSize;

    fn accelerated_options() -> RendererOptions {
        RendererOptions {
            backend: BackendKind::Accelerated,
            ..RendererOptions::default()
        }
    }

    #[test]
    fn failing_accelerated_setup_falls_back_to_software() {
        let backend = create_backend_with(
            SurfaceSize::new(32, 32),
            &accelerated_options(),
            &FontBook::new(),
            || bail!("no adapter"),
        )
        .expect("fallback must not surface an error");
        assert_eq!(backend.kind(), BackendKind::Software);
        assert!(backend
            .fallback_reason()
            .is_some_and(|reason| reason.contains("no adapter")));
    }

    #[test]
    fn panicking_accelerated_setup_falls_back_to_software() {
        let backend = create_backend_with(
            SurfaceSize::new(32, 32),
            &accelerated_options(),
            &FontBook::new(),
            || panic!("device lost"),
        )
        .expect("panic must be contained");
        assert_eq!(backend.kind(), BackendKind::Software);
        assert!(backend
            .fallback_reason()
            .is_some_and(|reason| reason.contains("device lost")));
    }

    #[test]
    fn successful_accelerated_constructor_is_used_as_is() {
        let backend = create_backend_with(
            SurfaceSize::new(32, 32),
            &accelerated_options(),
            &FontBook::new(),
            || Ok(Box::new(HeadlessBackend::new()) as Box<dyn RenderBackend>),
        )
        .expect("backend");
        assert_eq!(backend.kind(), BackendKind::Headless);
        assert!(backend.fallback_reason().is_none());
    }

    #[test]
    fn zero_sized_surface_is_fatal_for_software() {
        let result = create_backend_with(
            SurfaceSize::new(0, 0),
            &RendererOptions::default(),
            &FontBook::new(),
            || bail!("unused"),
        );
        assert!(result.is_err());
    }
}
