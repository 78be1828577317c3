use glam::Vec2;
use std::f32::consts::{FRAC_PI_2, TAU};

/// Pitch stays this far away from either pole.
pub const PITCH_MARGIN: f32 = 0.1;
pub const PITCH_LIMIT: f32 = FRAC_PI_2 - PITCH_MARGIN;
pub const ZOOM_MIN: f32 = 0.1;
pub const ZOOM_MAX: f32 = 5.0;

/// Orbit parameters read by the frame scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Radians, within `[-PITCH_LIMIT, PITCH_LIMIT]`.
    pub pitch: f32,
    /// Radians, unbounded.
    pub yaw: f32,
    /// Within `[ZOOM_MIN, ZOOM_MAX]`.
    pub zoom: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            yaw: 0.0,
            zoom: 1.0,
        }
    }
}

/// Maps input coordinates (window pixels) onto the render surface's pixel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub display: Vec2,
    pub logical: Vec2,
}

impl Viewport {
    pub fn new(display: Vec2, logical: Vec2) -> Self {
        Self { display, logical }
    }

    /// A viewport whose window and surface sizes agree.
    pub fn square_pixels(width: f32, height: f32) -> Self {
        let size = Vec2::new(width, height);
        Self::new(size, size)
    }

    pub fn to_logical(&self, position: Vec2) -> Vec2 {
        let scale = Vec2::new(
            ratio(self.logical.x, self.display.x),
            ratio(self.logical.y, self.display.y),
        );
        position * scale
    }
}

fn ratio(logical: f32, display: f32) -> f32 {
    if display > 0.0 {
        logical / display
    } else {
        1.0
    }
}

/// Everything the camera reacts to, already stripped of windowing details.
///
/// Positions are in display pixels. Touch events carry every touch that is
/// still active once the event has been applied, in a stable order.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { position: Vec2, primary: bool },
    PointerMove { position: Vec2 },
    PointerUp,
    TouchStart { touches: Vec<Vec2> },
    TouchMove { touches: Vec<Vec2> },
    TouchEnd { touches: Vec<Vec2> },
    /// Browser convention: negative is away from the user (zoom in).
    Wheel { delta_y: f32 },
    SliderInput { degrees: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        /// Last seen position, in logical pixels.
        anchor: Vec2,
    },
}

/// Per-gesture bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerSession {
    pub drag: DragState,
    /// Logical-pixel distance between the two touches at the last pinch move.
    pub pinch_distance: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    /// Zoom change per unit of wheel `delta_y`.
    pub wheel_sensitivity: f32,
    /// Zoom change per logical pixel of pinch distance.
    pub pinch_sensitivity: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            wheel_sensitivity: 0.001,
            pinch_sensitivity: 0.005,
        }
    }
}

/// Idle/Dragging state machine over orbit angles plus wheel and pinch zoom.
#[derive(Debug, Clone)]
pub struct CameraController {
    state: CameraState,
    session: PointerSession,
    settings: ControllerSettings,
    viewport: Viewport,
    sun_rotation: f32,
}

impl CameraController {
    pub fn new(settings: ControllerSettings, viewport: Viewport) -> Self {
        Self {
            state: CameraState::default(),
            session: PointerSession::default(),
            settings,
            viewport,
            sun_rotation: 0.0,
        }
    }

    #[inline]
    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Sun rotation in radians.
    #[inline]
    pub fn sun_rotation(&self) -> f32 {
        self.sun_rotation
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.session.drag, DragState::Dragging { .. })
    }

    pub fn handle(&mut self, event: &InputEvent) {
        match event {
            InputEvent::PointerDown { position, primary } => {
                if *primary {
                    self.begin_drag(*position);
                }
            }
            InputEvent::PointerMove { position } => self.drag_to(*position),
            InputEvent::PointerUp => self.session.drag = DragState::Idle,
            InputEvent::TouchStart { touches } => {
                self.session.pinch_distance = None;
                match touches.as_slice() {
                    [only] => self.begin_drag(*only),
                    // Zero touches, or a second finger turning the gesture into a pinch.
                    _ => self.session.drag = DragState::Idle,
                }
            }
            InputEvent::TouchMove { touches } => match touches.as_slice() {
                [] => {}
                [only] => self.drag_to(*only),
                [a, b, ..] => self.pinch(*a, *b),
            },
            InputEvent::TouchEnd { touches } => {
                self.session.pinch_distance = None;
                match touches.as_slice() {
                    // Lifting one finger of a pinch continues as a drag from the remaining one.
                    [only] => self.begin_drag(*only),
                    _ => self.session.drag = DragState::Idle,
                }
            }
            InputEvent::Wheel { delta_y } => {
                self.zoom_by(-delta_y * self.settings.wheel_sensitivity);
            }
            InputEvent::SliderInput { degrees } => {
                self.sun_rotation = degrees.to_radians();
            }
        }
    }

    fn begin_drag(&mut self, position: Vec2) {
        self.session.drag = DragState::Dragging {
            anchor: self.viewport.to_logical(position),
        };
    }

    fn drag_to(&mut self, position: Vec2) {
        let DragState::Dragging { anchor } = self.session.drag else {
            return;
        };

        let current = self.viewport.to_logical(position);
        let delta = current - anchor;
        let size = self.viewport.logical.max(Vec2::ONE);

        self.state.yaw += delta.x / size.x * TAU;
        self.state.pitch =
            (self.state.pitch + delta.y / size.y * TAU).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.session.drag = DragState::Dragging { anchor: current };
    }

    fn pinch(&mut self, a: Vec2, b: Vec2) {
        let distance = self
            .viewport
            .to_logical(a)
            .distance(self.viewport.to_logical(b));

        if let Some(last) = self.session.pinch_distance {
            self.zoom_by((distance - last) * self.settings.pinch_sensitivity);
        }
        self.session.pinch_distance = Some(distance);
    }

    fn zoom_by(&mut self, delta: f32) {
        if delta.is_finite() {
            self.state.zoom = (self.state.zoom + delta).clamp(ZOOM_MIN, ZOOM_MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(wheel: f32, pinch: f32) -> CameraController {
        CameraController::new(
            ControllerSettings {
                wheel_sensitivity: wheel,
                pinch_sensitivity: pinch,
            },
            Viewport::square_pixels(1920.0, 1080.0),
        )
    }

    fn drag(c: &mut CameraController, from: Vec2, to: Vec2) {
        c.handle(&InputEvent::PointerDown {
            position: from,
            primary: true,
        });
        c.handle(&InputEvent::PointerMove { position: to });
        c.handle(&InputEvent::PointerUp);
    }

    #[test]
    fn horizontal_drag_turns_yaw_only() {
        let mut c = controller(0.001, 0.005);
        drag(&mut c, Vec2::new(100.0, 100.0), Vec2::new(150.0, 100.0));

        let state = c.state();
        assert!((state.yaw - 50.0 / 1920.0 * TAU).abs() < 1e-6);
        assert!((state.yaw - 0.1636).abs() < 1e-4);
        assert_eq!(state.pitch, 0.0);
        assert!(!c.is_dragging());
    }

    #[test]
    fn two_drags_add_up() {
        let mut once = controller(0.001, 0.005);
        drag(&mut once, Vec2::ZERO, Vec2::new(60.0, 40.0));
        drag(&mut once, Vec2::ZERO, Vec2::new(60.0, 40.0));

        let mut double = controller(0.001, 0.005);
        drag(&mut double, Vec2::ZERO, Vec2::new(120.0, 80.0));

        assert!((once.state().yaw - double.state().yaw).abs() < 1e-5);
        assert!((once.state().pitch - double.state().pitch).abs() < 1e-5);
    }

    #[test]
    fn moves_are_incremental_from_the_last_position() {
        let mut c = controller(0.001, 0.005);
        c.handle(&InputEvent::PointerDown {
            position: Vec2::ZERO,
            primary: true,
        });
        for x in [10.0, 20.0, 30.0] {
            c.handle(&InputEvent::PointerMove {
                position: Vec2::new(x, 0.0),
            });
        }
        assert!((c.state().yaw - 30.0 / 1920.0 * TAU).abs() < 1e-6);
    }

    #[test]
    fn pitch_is_clamped_under_adversarial_drags() {
        let mut c = controller(0.001, 0.005);
        let offsets = [1e5, -3e5, 2.5e4, f32::MAX / 4.0, -1e3, 7.0];
        for dy in offsets {
            drag(&mut c, Vec2::ZERO, Vec2::new(0.0, dy));
            let pitch = c.state().pitch;
            assert!((-PITCH_LIMIT..=PITCH_LIMIT).contains(&pitch), "pitch {pitch}");
        }
    }

    #[test]
    fn moves_without_a_press_are_ignored() {
        let mut c = controller(0.001, 0.005);
        c.handle(&InputEvent::PointerMove {
            position: Vec2::new(500.0, 500.0),
        });
        c.handle(&InputEvent::PointerDown {
            position: Vec2::ZERO,
            primary: false,
        });
        c.handle(&InputEvent::PointerMove {
            position: Vec2::new(900.0, 10.0),
        });
        assert_eq!(c.state(), CameraState::default());
    }

    #[test]
    fn wheel_zooms_in_on_negative_delta() {
        let mut c = controller(0.01, 0.005);
        c.handle(&InputEvent::Wheel { delta_y: -100.0 });
        assert!((c.state().zoom - 2.0).abs() < 1e-6);

        for _ in 0..10 {
            c.handle(&InputEvent::Wheel { delta_y: -100.0 });
        }
        assert_eq!(c.state().zoom, ZOOM_MAX);
    }

    #[test]
    fn zoom_is_clamped_under_any_sequence() {
        let mut c = controller(0.013, 0.07);
        let deltas = [300.0, -1e6, 42.0, 1e9, -17.5, f32::NAN, -0.3];
        for delta_y in deltas {
            c.handle(&InputEvent::Wheel { delta_y });
            let zoom = c.state().zoom;
            assert!((ZOOM_MIN..=ZOOM_MAX).contains(&zoom), "zoom {zoom}");
        }

        c.handle(&InputEvent::TouchStart {
            touches: vec![Vec2::ZERO, Vec2::new(10.0, 0.0)],
        });
        for spread in [2_000.0, 5.0, 90_000.0, 0.0] {
            c.handle(&InputEvent::TouchMove {
                touches: vec![Vec2::ZERO, Vec2::new(spread, 0.0)],
            });
            let zoom = c.state().zoom;
            assert!((ZOOM_MIN..=ZOOM_MAX).contains(&zoom), "zoom {zoom}");
        }
    }

    #[test]
    fn first_pinch_move_records_distance_only() {
        let mut c = controller(0.001, 0.01);
        c.handle(&InputEvent::TouchStart {
            touches: vec![Vec2::new(100.0, 100.0)],
        });
        c.handle(&InputEvent::TouchStart {
            touches: vec![Vec2::new(100.0, 100.0), Vec2::new(200.0, 100.0)],
        });
        assert!(!c.is_dragging());

        let before = c.state().zoom;
        c.handle(&InputEvent::TouchMove {
            touches: vec![Vec2::new(100.0, 100.0), Vec2::new(300.0, 100.0)],
        });
        assert_eq!(c.state().zoom, before);

        c.handle(&InputEvent::TouchMove {
            touches: vec![Vec2::new(100.0, 100.0), Vec2::new(350.0, 100.0)],
        });
        assert!((c.state().zoom - (before + 0.5)).abs() < 1e-5);
        assert_eq!(c.state().yaw, 0.0);
    }

    #[test]
    fn lifting_one_pinch_finger_resumes_drag_without_jump() {
        let mut c = controller(0.001, 0.01);
        c.handle(&InputEvent::TouchStart {
            touches: vec![Vec2::new(100.0, 100.0), Vec2::new(400.0, 100.0)],
        });
        c.handle(&InputEvent::TouchEnd {
            touches: vec![Vec2::new(400.0, 100.0)],
        });
        assert!(c.is_dragging());

        c.handle(&InputEvent::TouchMove {
            touches: vec![Vec2::new(400.0, 100.0)],
        });
        assert_eq!(c.state().yaw, 0.0);

        c.handle(&InputEvent::TouchMove {
            touches: vec![Vec2::new(496.0, 100.0)],
        });
        assert!((c.state().yaw - 96.0 / 1920.0 * TAU).abs() < 1e-6);

        c.handle(&InputEvent::TouchEnd { touches: vec![] });
        assert!(!c.is_dragging());
    }

    #[test]
    fn pinch_restarts_after_touch_count_changes() {
        let mut c = controller(0.001, 0.01);
        let two = |x: f32| vec![Vec2::ZERO, Vec2::new(x, 0.0)];

        c.handle(&InputEvent::TouchStart { touches: two(100.0) });
        c.handle(&InputEvent::TouchMove { touches: two(100.0) });
        c.handle(&InputEvent::TouchMove { touches: two(150.0) });
        let zoom = c.state().zoom;

        c.handle(&InputEvent::TouchEnd {
            touches: vec![Vec2::ZERO],
        });
        c.handle(&InputEvent::TouchStart { touches: two(600.0) });
        c.handle(&InputEvent::TouchMove { touches: two(600.0) });
        assert_eq!(c.state().zoom, zoom);
    }

    #[test]
    fn positions_are_scaled_into_logical_pixels() {
        let mut scaled = CameraController::new(
            ControllerSettings::default(),
            Viewport::new(Vec2::new(960.0, 540.0), Vec2::new(1920.0, 1080.0)),
        );
        drag(&mut scaled, Vec2::new(50.0, 50.0), Vec2::new(75.0, 60.0));

        let mut native = controller(0.001, 0.005);
        drag(&mut native, Vec2::new(100.0, 100.0), Vec2::new(150.0, 120.0));

        assert!((scaled.state().yaw - native.state().yaw).abs() < 1e-6);
        assert!((scaled.state().pitch - native.state().pitch).abs() < 1e-6);
    }

    #[test]
    fn viewport_with_zero_display_size_passes_positions_through() {
        let viewport = Viewport::new(Vec2::ZERO, Vec2::new(800.0, 600.0));
        assert_eq!(viewport.to_logical(Vec2::new(3.0, 4.0)), Vec2::new(3.0, 4.0));
    }

    #[test]
    fn slider_sets_sun_rotation_in_radians() {
        let mut c = controller(0.001, 0.005);
        c.handle(&InputEvent::SliderInput { degrees: 90.0 });
        assert!((c.sun_rotation() - FRAC_PI_2).abs() < 1e-6);
        c.handle(&InputEvent::SliderInput { degrees: -180.0 });
        assert!((c.sun_rotation() + std::f32::consts::PI).abs() < 1e-6);
    }
}
