use crate::{
    assets::DirAssets,
    camera::{CameraController, InputEvent, Viewport},
    config::Config,
    error::StartupError,
    frame::{FrameScheduler, StaticUniforms},
    input::InputTranslator,
    renderer::{context::GfxContext, Renderer},
    startup::{self, ElevationRequest, ProgramParts},
    ui,
};
use glam::Vec2;
use std::{sync::Arc, time::Instant};
use winit::{event::WindowEvent, window::Window};

pub struct App {
    pub renderer: Renderer,
    pub camera: CameraController,
    pub input: InputTranslator,
    pub scheduler: FrameScheduler,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    sun_degrees: f32,
    started: Instant,
}

impl App {
    /// context → program → elevation → texture + pipeline. Any failure stops here.
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self, StartupError> {
        let gfx = GfxContext::new(window.clone(), config.vsync).await?;

        let assets = DirAssets::new(&config.assets);
        log::info!("Loading assets from {}.", assets.root().display());
        let ProgramParts { program, locations } =
            startup::build_program(&assets, &config.vertex_shader, &config.fragment_shader)?;

        let elevation = startup::load_elevation(
            &assets,
            &ElevationRequest {
                name: &config.elevation,
                format: config.format.into(),
                resolution: config.resolution,
                radius_offset: config.radius_offset,
            },
        )?;

        let mut scheduler = FrameScheduler::new(&program, &locations);
        scheduler.write_static(StaticUniforms {
            resolution: gfx.surface_size(),
            map_resolution: elevation.shape().resolution,
            radius_offset: elevation.radius_offset(),
        });

        let uniform_size = scheduler.uniform_bytes().len() as u64;
        let renderer =
            Renderer::new(gfx, &program, &elevation, config.filter, uniform_size).await?;

        let camera = CameraController::new(
            config.controller_settings(),
            viewport(&window, &renderer),
        );

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        Ok(Self {
            renderer,
            camera,
            input: InputTranslator::new(),
            scheduler,
            egui_ctx,
            egui_state,
            sun_degrees: 0.0,
            started: Instant::now(),
        })
    }

    pub fn resize(&mut self, window: &Window, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            self.scheduler.set_resolution(self.renderer.gfx.surface_size());
            self.camera.set_viewport(viewport(window, &self.renderer));
        }
    }

    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        let input = self.input.translate(event);

        if response.consumed {
            // A release over the HUD still ends a drag that started on the planet.
            if let Some(release @ (InputEvent::PointerUp | InputEvent::TouchEnd { .. })) = input {
                self.camera.handle(&release);
            }
            return true;
        }

        if let Some(input) = input {
            self.camera.handle(&input);
        }

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(window, *physical_size);
        }

        false
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .renderer
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let now = self.started.elapsed().as_secs_f64();
        {
            let mut scene = self.renderer.scene_pass(&mut encoder, &swap_view);
            self.scheduler.frame(now, &self.camera, &mut scene);
            scene.finish();
        }

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        ui::draw_hud(&self.egui_ctx, self.scheduler.fps(), self.camera.state());
        if ui::draw_lighting_panel(&self.egui_ctx, &mut self.sun_degrees) {
            self.camera.handle(&InputEvent::SliderInput {
                degrees: self.sun_degrees,
            });
        }

        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);
        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gfx.device,
                &self.renderer.gfx.queue,
                *id,
                delta,
            );
        }

        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gfx
            .queue
            .submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }
}

/// Window pixels (where input arrives) against surface pixels (where it is drawn).
fn viewport(window: &Window, renderer: &Renderer) -> Viewport {
    let display = window.inner_size();
    let [width, height] = renderer.gfx.surface_size();
    Viewport::new(
        Vec2::new(display.width as f32, display.height as f32),
        Vec2::new(width, height),
    )
}
