//! The packed elevation grid as a sampled texture.

use crate::{
    config::TextureFilterMode,
    error::StartupError,
    program::{ProgramError, TextureSample},
};
use marsmap::PackedElevation;

/// GPU-side choices implied by the shader's texture type and the filter setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainFormat {
    pub format: wgpu::TextureFormat,
    pub sample_type: wgpu::TextureSampleType,
    pub sampler_binding: wgpu::SamplerBindingType,
    pub filter: wgpu::FilterMode,
}

impl TerrainFormat {
    /// `sample` is the program's texture type; `None` when it samples nothing.
    pub fn select(
        sample: Option<TextureSample>,
        filter: TextureFilterMode,
    ) -> Result<Self, StartupError> {
        let unfiltered = |format, sample_type| Self {
            format,
            sample_type,
            sampler_binding: wgpu::SamplerBindingType::NonFiltering,
            filter: wgpu::FilterMode::Nearest,
        };

        Ok(match sample {
            None | Some(TextureSample::Float) => Self {
                format: wgpu::TextureFormat::Rgba8Unorm,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                sampler_binding: wgpu::SamplerBindingType::Filtering,
                filter: match filter {
                    TextureFilterMode::Nearest => wgpu::FilterMode::Nearest,
                    TextureFilterMode::Linear => wgpu::FilterMode::Linear,
                },
            },
            Some(TextureSample::Uint) => unfiltered(
                wgpu::TextureFormat::Rgba8Uint,
                wgpu::TextureSampleType::Uint,
            ),
            Some(TextureSample::Sint) => unfiltered(
                wgpu::TextureFormat::Rgba8Sint,
                wgpu::TextureSampleType::Sint,
            ),
            Some(TextureSample::Depth) => {
                return Err(StartupError::Program(ProgramError::Link {
                    log: "elevation texture cannot be bound as a depth texture".to_owned(),
                }))
            }
        })
    }
}

/// Fails unless `width x height` fits the device's 2D texture limit.
pub fn check_size(width: u32, height: u32, limit: u32) -> Result<(), StartupError> {
    if width > limit || height > limit {
        return Err(StartupError::TextureTooLarge {
            width,
            height,
            limit,
        });
    }
    Ok(())
}

pub struct TerrainTexture {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub format: TerrainFormat,
}

impl TerrainTexture {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        elevation: &PackedElevation,
        format: TerrainFormat,
    ) -> Result<Self, StartupError> {
        let (width, height) = (elevation.width(), elevation.height());
        check_size(width, height, device.limits().max_texture_dimension_2d)?;

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Elevation Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // No 3-channel formats in wgpu: widen to RGBA with opaque alpha.
        let rgba = elevation.to_rgba();
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Elevation Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: format.filter,
            min_filter: format.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        log::info!(
            "Uploaded {width}x{height} elevation texture as {:?} ({:?} filtering).",
            format.format,
            format.filter
        );

        Ok(Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: texture,
            sampler,
            format,
        })
    }
}
