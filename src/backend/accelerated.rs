use std::sync::mpsc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use super::software::GlyphCanvas;
use super::{BackendStats, RenderBackend};
use crate::color::ColorRgba;
use crate::font::FontBook;
use crate::options::{BackendKind, RendererOptions};
use crate::pattern::CharacterData;
use crate::region::{RenderRegion, SurfaceSize};

/// GPU presentation backend.
///
/// Glyphs are composed on a CPU staging canvas and uploaded into a wgpu texture each
/// frame; readback copies the texture through a mapped buffer.
pub struct AcceleratedBackend {
    staging: GlyphCanvas,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: GpuTarget,
    adapter_name: String,
    stats: BackendStats,
}

struct GpuTarget {
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    readback_buffer: wgpu::Buffer,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
}

impl AcceleratedBackend {
    /// Acquires a GPU device and allocates the target texture.
    pub fn new(size: SurfaceSize, options: &RendererOptions, fonts: &FontBook) -> Result<Self> {
        let staging = GlyphCanvas::new(size, options, fonts)?;
        let (device, queue, adapter_name) = pollster::block_on(acquire_device())?;
        let target = GpuTarget::new(&device, size)?;
        debug!(adapter = %adapter_name, width = size.width, height = size.height, "gpu target ready");
        Ok(Self {
            staging,
            device,
            queue,
            target,
            adapter_name,
            stats: BackendStats::default(),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn upload(&self) {
        let rgba = self.staging.surface.to_rgba();
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.target.unpadded_bytes_per_row),
                rows_per_image: Some(self.target.height),
            },
            self.target.extent(),
        );
        self.queue.submit(std::iter::empty());
    }
}

async fn acquire_device() -> Result<(wgpu::Device, wgpu::Queue, String)> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await
        .ok_or_else(|| anyhow!("no suitable GPU adapter found"))?;
    let adapter_name = adapter.get_info().name;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("glyphfield-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        )
        .await
        .context("failed to request wgpu device")?;
    Ok((device, queue, adapter_name))
}

impl GpuTarget {
    fn new(device: &wgpu::Device, size: SurfaceSize) -> Result<Self> {
        let SurfaceSize { width, height } = size;
        check_extent(size, device.limits().max_texture_dimension_2d)?;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("glyphfield-target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let unpadded_bytes_per_row = width
            .checked_mul(4)
            .ok_or_else(|| anyhow!("surface width overflow when computing row bytes"))?;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glyphfield-readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Ok(Self {
            width,
            height,
            texture,
            readback_buffer,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        })
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    fn read(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<u8>> {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("glyphfield-readback-encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.readback_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            self.extent(),
        );
        queue.submit(Some(encoder.finish()));

        let buffer_slice = self.readback_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|_| anyhow!("failed receiving GPU map callback"))?
            .context("GPU buffer mapping failed")?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = self.unpadded_bytes_per_row as usize;
        let mut frame = vec![0_u8; row_bytes * self.height as usize];
        for (row_index, chunk) in mapped
            .chunks(self.padded_bytes_per_row as usize)
            .take(self.height as usize)
            .enumerate()
        {
            let start = row_index * row_bytes;
            frame[start..start + row_bytes].copy_from_slice(&chunk[..row_bytes]);
        }

        drop(mapped);
        self.readback_buffer.unmap();
        Ok(frame)
    }
}

impl RenderBackend for AcceleratedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerated
    }

    fn initialize(
        &mut self,
        size: SurfaceSize,
        options: &RendererOptions,
        fonts: &FontBook,
    ) -> Result<()> {
        self.staging = GlyphCanvas::new(size, options, fonts)?;
        self.target = GpuTarget::new(&self.device, size)?;
        Ok(())
    }

    fn configure(&mut self, options: &RendererOptions, fonts: &FontBook) {
        self.staging.configure(options, fonts);
    }

    fn clear(&mut self, background: ColorRgba) -> Result<()> {
        self.staging.surface.fill(background);
        self.stats.clears += 1;
        Ok(())
    }

    fn render(&mut self, characters: &[CharacterData], region: &RenderRegion) -> Result<()> {
        self.staging.draw(characters, region);
        self.upload();
        self.stats.renders += 1;
        Ok(())
    }

    fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        let target = GpuTarget::new(&self.device, size)?;
        self.staging.surface.resize(size)?;
        self.target = target;
        self.stats.resizes += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        self.target.texture.destroy();
        self.target.readback_buffer.destroy();
    }

    fn stats(&self) -> BackendStats {
        self.stats
    }

    fn read_rgba(&self) -> Result<Option<Vec<u8>>> {
        self.target.read(&self.device, &self.queue).map(Some)
    }
}

/// Rejects targets the device cannot allocate, before wgpu reports it as an uncaptured error.
fn check_extent(size: SurfaceSize, max_dimension: u32) -> Result<()> {
    if size.width == 0 || size.height == 0 {
        bail!(
            "cannot allocate a GPU target of {}x{}",
            size.width,
            size.height
        );
    }
    if size.width > max_dimension || size.height > max_dimension {
        bail!(
            "GPU target {}x{} exceeds the device texture limit of {max_dimension}",
            size.width,
            size.height
        );
    }
    Ok(())
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

#[cfg(test)]
mod tests {
    use super::{align_to, check_extent};
    use crate::region::SurfaceSize;

    #[test]
    fn rows_align_to_copy_boundary() {
        assert_eq!(align_to(4, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(1028, 256), 1280);
    }

    #[test]
    fn oversized_targets_are_rejected() {
        assert!(check_extent(SurfaceSize::new(2048, 2048), 2048).is_ok());
        let error = check_extent(SurfaceSize::new(4096, 2160), 2048).expect_err("too wide");
        assert!(error.to_string().contains("4096x2160"));
        assert!(check_extent(SurfaceSize::new(0, 10), 8192).is_err());
    }
}
