//! egui overlay: FPS and camera readout, plus the lighting control.

use crate::camera::CameraState;
use egui::{Align2, Color32, RichText};

pub const SUN_DEGREES_RANGE: std::ops::RangeInclusive<f32> = -180.0..=180.0;

pub fn fps_label(fps: Option<f32>) -> String {
    match fps {
        Some(fps) => format!("FPS: {fps:.1}"),
        None => "FPS: --".to_owned(),
    }
}

pub fn camera_label(camera: CameraState) -> String {
    format!(
        "pitch {:+.1}°  yaw {:+.1}°  zoom {:.2}",
        camera.pitch.to_degrees(),
        camera.yaw.to_degrees().rem_euclid(360.0),
        camera.zoom
    )
}

pub fn draw_hud(ctx: &egui::Context, fps: Option<f32>, camera: CameraState) {
    egui::Area::new(egui::Id::new("hud"))
        .anchor(Align2::LEFT_TOP, [10.0, 10.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(
                RichText::new(fps_label(fps))
                    .monospace()
                    .color(Color32::from_rgb(255, 170, 120)),
            );
            ui.label(
                RichText::new(camera_label(camera))
                    .monospace()
                    .small()
                    .color(Color32::LIGHT_GRAY),
            );
        });
}

/// Returns `true` when the slider moved this frame.
pub fn draw_lighting_panel(ctx: &egui::Context, sun_degrees: &mut f32) -> bool {
    let mut changed = false;

    egui::Window::new("Lighting")
        .anchor(Align2::RIGHT_TOP, [-10.0, 10.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            changed = ui
                .add(egui::Slider::new(sun_degrees, SUN_DEGREES_RANGE).text("Sun rotation (°)"))
                .changed();
        });

    changed
}
