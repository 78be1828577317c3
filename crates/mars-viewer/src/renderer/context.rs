use crate::error::StartupError;
use std::sync::Arc;
use winit::window::Window;

/// Holds all GPU resources needed for rendering.
pub struct GfxContext {
    pub surface: wgpu::Surface<'static>,
    pub device:  wgpu::Device,
    pub queue:   wgpu::Queue,
    pub config:  wgpu::SurfaceConfiguration,
    pub size:    winit::dpi::PhysicalSize<u32>,
}

impl GfxContext {
    /// Creates a new graphics context bound to the given window.
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, StartupError> {
        let context = Self::create(window, vsync).await;
        match &context {
            Ok(gfx) => log::info!(
                "Graphics context ready: {:?}, {}x{}.",
                gfx.config.format,
                gfx.config.width,
                gfx.config.height
            ),
            Err(err) => log::error!("Unable to initialize the graphics context: {err}"),
        }
        context
    }

    async fn create(window: Arc<Window>, vsync: bool) -> Result<Self, StartupError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

        // The surface must outlive the window; `Arc` guarantees this.
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| StartupError::ContextInit(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference:       wgpu::PowerPreference::HighPerformance,
                compatible_surface:     Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| StartupError::ContextInit("no suitable GPU adapter".to_owned()))?;

        // Default limits, raised to the adapter's texture size so large maps fit.
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label:             Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits:   wgpu::Limits::default().using_resolution(adapter.limits()),
                },
                None, // no trace
            )
            .await
            .map_err(|e| StartupError::ContextInit(e.to_string()))?;

        // Determine the surface format (prefer sRGB).
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| StartupError::ContextInit("surface reports no formats".to_owned()))?;

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage:                         wgpu::TextureUsages::RENDER_ATTACHMENT,
            format:                        surface_format,
            width:                         size.width.max(1),
            height:                        size.height.max(1),
            present_mode,
            alpha_mode:                    caps.alpha_modes.first().copied().unwrap_or_default(),
            view_formats:                  vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
        })
    }

    /// Resizes the swap chain when the window size changes.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Surface size in pixels.
    pub fn surface_size(&self) -> [f32; 2] {
        [self.config.width as f32, self.config.height as f32]
    }
}
