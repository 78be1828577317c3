//! The rendering orchestrator. Owns the GPU context, the elevation texture,
//! the ray-march pipeline and the egui renderer.

pub mod context;
pub mod pipelines;
pub mod terrain;

use self::{
    context::GfxContext,
    pipelines::raymarch::RaymarchPipeline,
    terrain::{TerrainFormat, TerrainTexture},
};
use crate::{
    config::TextureFilterMode, error::StartupError, frame::FrameTarget, program::ShaderProgram,
};
use marsmap::PackedElevation;

/// Owns all rendering-related state.
pub struct Renderer {
    pub gfx: GfxContext,
    pub terrain: TerrainTexture,
    pub raymarch: RaymarchPipeline,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    /// Uploads the elevation texture, then builds the pipeline around it.
    pub async fn new(
        gfx: GfxContext,
        program: &ShaderProgram,
        elevation: &PackedElevation,
        filter: TextureFilterMode,
        uniform_size: u64,
    ) -> Result<Self, StartupError> {
        let format = TerrainFormat::select(program.texture_sample(), filter)?;
        let terrain = TerrainTexture::upload(&gfx.device, &gfx.queue, elevation, format)?;

        let raymarch = RaymarchPipeline::new(
            &gfx.device,
            gfx.config.format,
            program,
            &terrain,
            uniform_size,
        )
        .await?;

        let egui_renderer =
            egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            terrain,
            raymarch,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
        }
    }

    /// A [`FrameTarget`] recording into `encoder` and drawing onto `view`.
    pub fn scene_pass<'a>(
        &'a self,
        encoder: &'a mut wgpu::CommandEncoder,
        view: &'a wgpu::TextureView,
    ) -> ScenePass<'a> {
        ScenePass {
            queue: &self.gfx.queue,
            raymarch: &self.raymarch,
            encoder,
            view,
            pending_clear: None,
        }
    }
}

/// Defers the clear into the load op of the pass that draws the quad.
pub struct ScenePass<'a> {
    queue: &'a wgpu::Queue,
    raymarch: &'a RaymarchPipeline,
    encoder: &'a mut wgpu::CommandEncoder,
    view: &'a wgpu::TextureView,
    pending_clear: Option<wgpu::Color>,
}

impl ScenePass<'_> {
    fn begin(&mut self) -> wgpu::RenderPass<'_> {
        let load = match self.pending_clear.take() {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };

        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Raymarch Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Flushes a clear that no draw consumed.
    pub fn finish(mut self) {
        if self.pending_clear.is_some() {
            self.begin();
        }
    }
}

impl FrameTarget for ScenePass<'_> {
    fn clear(&mut self, color: wgpu::Color) {
        self.pending_clear = Some(color);
    }

    fn write_uniforms(&mut self, bytes: &[u8]) {
        self.raymarch.write_uniforms(self.queue, bytes);
    }

    fn draw_quad(&mut self, vertex_count: u32) {
        let raymarch = self.raymarch;
        let mut pass = self.begin();
        raymarch.draw(&mut pass, vertex_count);
    }
}
