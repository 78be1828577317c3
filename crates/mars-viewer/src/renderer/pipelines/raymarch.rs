use crate::{
    error::StartupError,
    frame::QUAD_VERTEX_COUNT,
    program::{ProgramError, ResourceKind, ResourceSlot, ShaderProgram, BIND_GROUP, POSITION_LOCATION},
    renderer::terrain::{TerrainFormat, TerrainTexture},
};
use wgpu::util::DeviceExt;

/// Full-screen quad as two triangles in NDC.
pub const QUAD_CORNERS: [[f32; 2]; QUAD_VERTEX_COUNT as usize] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

/// The single program: full-screen quad in, ray-marched planet out.
pub struct RaymarchPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    pub uniform_buffer: wgpu::Buffer,
    quad_vb: wgpu::Buffer,
}

impl RaymarchPipeline {
    /// Validation errors raised by wgpu while building are reported as link errors.
    pub async fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        program: &ShaderProgram,
        terrain: &TerrainTexture,
        uniform_size: u64,
    ) -> Result<Self, StartupError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = Self::create(device, surface_format, program, terrain, uniform_size);

        if let Some(err) = device.pop_error_scope().await {
            let err = ProgramError::Link {
                log: err.to_string(),
            };
            log::error!("{err}");
            return Err(err.into());
        }

        log::info!(
            "Ray-march pipeline ready ({} bindings, {} byte uniform block).",
            program.resources().len(),
            uniform_size
        );
        Ok(pipeline)
    }

    fn create(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        program: &ShaderProgram,
        terrain: &TerrainTexture,
        uniform_size: u64,
    ) -> Self {
        let reflected_size = program
            .uniform_block()
            .map_or(uniform_size, |block| u64::from(block.size));

        let entries: Vec<_> = program
            .resources()
            .iter()
            .map(|slot| layout_entry(slot, reflected_size, &terrain.format))
            .collect();

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Raymarch Bind Group Layout"),
            entries: &entries,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Raymarch UBO"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_entries: Vec<_> = program
            .resources()
            .iter()
            .map(|slot| wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: match slot.kind {
                    ResourceKind::UniformBuffer => uniform_buffer.as_entire_binding(),
                    ResourceKind::Texture(_) => wgpu::BindingResource::TextureView(&terrain.view),
                    ResourceKind::Sampler { .. } => wgpu::BindingResource::Sampler(&terrain.sampler),
                },
            })
            .collect();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Raymarch Bind Group"),
            layout: &layout,
            entries: &bind_entries,
        });

        let vs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Raymarch VS"),
            source: wgpu::ShaderSource::Wgsl(program.vertex().source().into()),
        });
        let fs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Raymarch FS"),
            source: wgpu::ShaderSource::Wgsl(program.fragment().source().into()),
        });

        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Raymarch Quad VB"),
            contents: bytemuck::cast_slice(&QUAD_CORNERS),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Raymarch PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Raymarch Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vs,
                entry_point: program.vertex().entry_point(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        shader_location: POSITION_LOCATION,
                        offset: 0,
                        format: wgpu::VertexFormat::Float32x2,
                    }],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            fragment: Some(wgpu::FragmentState {
                module: &fs,
                entry_point: program.fragment().entry_point(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            layout,
            bind_group,
            uniform_buffer,
            quad_vb,
        }
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, bytes: &[u8]) {
        queue.write_buffer(&self.uniform_buffer, 0, bytes);
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, vertex_count: u32) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(BIND_GROUP, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
        rpass.draw(0..vertex_count.min(QUAD_VERTEX_COUNT), 0..1);
    }
}

fn layout_entry(
    slot: &ResourceSlot,
    uniform_size: u64,
    terrain: &TerrainFormat,
) -> wgpu::BindGroupLayoutEntry {
    let mut visibility = wgpu::ShaderStages::NONE;
    if slot.vertex {
        visibility |= wgpu::ShaderStages::VERTEX;
    }
    if slot.fragment {
        visibility |= wgpu::ShaderStages::FRAGMENT;
    }

    let ty = match slot.kind {
        ResourceKind::UniformBuffer => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(uniform_size),
        },
        ResourceKind::Texture(_) => wgpu::BindingType::Texture {
            sample_type: terrain.sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        ResourceKind::Sampler { comparison: true } => {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        }
        ResourceKind::Sampler { comparison: false } => {
            wgpu::BindingType::Sampler(terrain.sampler_binding)
        }
    };

    wgpu::BindGroupLayoutEntry {
        binding: slot.binding,
        visibility,
        ty,
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TextureFilterMode,
        program::{
            tests::{MARS_FS, QUAD_VS},
            ProgramBuilder, TextureSample,
        },
    };

    #[test]
    fn quad_covers_clip_space() {
        let area: f32 = QUAD_CORNERS
            .chunks_exact(3)
            .map(|t| {
                let (a, b, c) = (t[0], t[1], t[2]);
                ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])) * 0.5
            })
            .sum();
        assert_eq!(area, 4.0);
    }

    #[test]
    fn layout_follows_reflected_bindings() {
        let program = ProgramBuilder::new().build(QUAD_VS, MARS_FS).unwrap();
        let format =
            TerrainFormat::select(program.texture_sample(), TextureFilterMode::Linear).unwrap();
        let size = u64::from(program.uniform_block().unwrap().size);

        let entries: Vec<_> = program
            .resources()
            .iter()
            .map(|slot| layout_entry(slot, size, &format))
            .collect();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].visibility, wgpu::ShaderStages::FRAGMENT);
        assert!(matches!(
            entries[0].ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                min_binding_size: Some(s),
                ..
            } if s.get() == size
        ));
        assert_eq!(program.texture_sample(), Some(TextureSample::Float));
        assert!(matches!(
            entries[1].ty,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                ..
            }
        ));
        assert_eq!(
            entries[2].ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        );
    }
}
