//! `mars_viewer` binary: parse config, open the window, orbit Mars.

use anyhow::{Context, Result};
use clap::Parser;
use mars_viewer::{app::App, config::Config};
use std::sync::Arc;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    // RUST_LOG overrides; startup stages report at info.
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let config = Config::parse();

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Mars")
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height))
            .build(&event_loop)?,
    );

    // Context, program, elevation and pipeline in order; the first failure ends the process.
    let mut app = pollster::block_on(App::new(window.clone(), &config))
        .context("viewer startup failed")?;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                // The app sees every event first (egui, camera, resize).
                if !app.handle_event(&window, &event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                                elwt.exit();
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            match app.render(&window) {
                                Ok(_) => {}
                                Err(wgpu::SurfaceError::Lost) => {
                                    app.resize(&window, app.renderer.gfx.size);
                                }
                                Err(wgpu::SurfaceError::OutOfMemory) => {
                                    log::error!("Surface out of memory, shutting the viewer down.");
                                    elwt.exit();
                                }
                                Err(e) => log::warn!("Frame skipped: {e:?}"),
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                // Continuous redraw drives the frame scheduler.
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
