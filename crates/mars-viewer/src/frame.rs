//! Per-frame cycle: clock → clear → uniforms → quad draw → FPS.

use crate::{
    camera::CameraController,
    program::{ShaderProgram, UniformBlock, UniformLocation, UniformLocations},
};

/// Non-indexed vertices of the full-screen quad.
pub const QUAD_VERTEX_COUNT: u32 = 6;
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color::BLACK;
/// Seconds of frames averaged into one FPS reading.
pub const FPS_PUBLISH_INTERVAL: f64 = 0.5;
/// The elevation texture is always the first texture unit.
pub const RADIUS_TEXTURE_UNIT: i32 = 0;

pub const I_RESOLUTION: &str = "iResolution";
pub const I_TIME: &str = "iTime";
pub const CAM_ROT: &str = "cam_rot";
pub const CAM_ZOOM: &str = "cam_zoom";
pub const SUN_ROT: &str = "sun_rot";
pub const RADIUS_DATA: &str = "radius_data";
pub const MARS_MAP_RES: &str = "mars_map_res";
pub const RADIUS_OFFSET: &str = "radius_offset";

/// Every uniform the host knows how to feed.
pub const UNIFORM_NAMES: [&str; 8] = [
    I_RESOLUTION,
    I_TIME,
    CAM_ROT,
    CAM_ZOOM,
    SUN_ROT,
    RADIUS_DATA,
    MARS_MAP_RES,
    RADIUS_OFFSET,
];

/// Resolved slots of the uniform contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneUniforms {
    pub resolution: Option<UniformLocation>,
    pub time: Option<UniformLocation>,
    pub cam_rot: Option<UniformLocation>,
    pub cam_zoom: Option<UniformLocation>,
    pub sun_rot: Option<UniformLocation>,
    pub radius_data: Option<UniformLocation>,
    pub map_resolution: Option<UniformLocation>,
    pub radius_offset: Option<UniformLocation>,
}

impl SceneUniforms {
    pub fn from_locations(locations: &UniformLocations) -> Self {
        Self {
            resolution: locations.get(I_RESOLUTION),
            time: locations.get(I_TIME),
            cam_rot: locations.get(CAM_ROT),
            cam_zoom: locations.get(CAM_ZOOM),
            sun_rot: locations.get(SUN_ROT),
            radius_data: locations.get(RADIUS_DATA),
            map_resolution: locations.get(MARS_MAP_RES),
            radius_offset: locations.get(RADIUS_OFFSET),
        }
    }
}

/// Values written once at startup; the resolution again on resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticUniforms {
    pub resolution: [f32; 2],
    pub map_resolution: u32,
    pub radius_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub index: u64,
    /// Seconds since the previous frame; 0 on the first frame.
    pub dt: f64,
    /// Seconds since the first frame.
    pub elapsed: f64,
    /// Set on the frames that close an FPS window.
    pub published_fps: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    start: Option<f64>,
    previous: Option<f64>,
    window_time: f64,
    window_frames: u32,
    fps: Option<f32>,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last published frames-per-second.
    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    pub fn tick(&mut self, now: f64) -> FrameTick {
        let start = *self.start.get_or_insert(now);
        let previous = self.previous;

        // A timestamp that goes backwards counts as no time passing.
        let dt = match previous {
            Some(prev) if now > prev => now - prev,
            _ => 0.0,
        };
        self.previous = Some(previous.map_or(now, |prev| prev.max(now)));

        let index = self.frames;
        self.frames += 1;

        let mut published_fps = None;
        if previous.is_some() {
            self.window_time += dt;
            self.window_frames += 1;

            if self.window_time >= FPS_PUBLISH_INTERVAL {
                let fps = (self.window_frames as f64 / self.window_time) as f32;
                self.fps = Some(fps);
                published_fps = Some(fps);
                self.window_time = 0.0;
                self.window_frames = 0;
            }
        }

        FrameTick {
            index,
            dt,
            elapsed: (now - start).max(0.0),
            published_fps,
        }
    }
}

/// Where a frame's commands go. The renderer implements it on top of a wgpu
/// render pass; tests record the calls.
pub trait FrameTarget {
    fn clear(&mut self, color: wgpu::Color);
    fn write_uniforms(&mut self, bytes: &[u8]);
    fn draw_quad(&mut self, vertex_count: u32);
}

pub struct FrameScheduler {
    clock: FrameClock,
    slots: SceneUniforms,
    block: UniformBlock,
}

impl FrameScheduler {
    pub fn new(program: &ShaderProgram, locations: &UniformLocations) -> Self {
        Self {
            clock: FrameClock::new(),
            slots: SceneUniforms::from_locations(locations),
            block: UniformBlock::for_program(program),
        }
    }

    pub fn write_static(&mut self, values: StaticUniforms) {
        self.set_resolution(values.resolution);
        self.block.set_i32(self.slots.radius_data, RADIUS_TEXTURE_UNIT);
        self.block
            .set_f32(self.slots.map_resolution, values.map_resolution as f32);
        self.block
            .set_f32(self.slots.radius_offset, values.radius_offset as f32);
    }

    pub fn set_resolution(&mut self, resolution: [f32; 2]) {
        self.block.set_vec2(self.slots.resolution, resolution);
    }

    pub fn fps(&self) -> Option<f32> {
        self.clock.fps()
    }

    pub fn uniform_bytes(&self) -> &[u8] {
        self.block.bytes()
    }

    pub fn frame<T: FrameTarget>(
        &mut self,
        now: f64,
        camera: &CameraController,
        target: &mut T,
    ) -> FrameTick {
        let tick = self.clock.tick(now);

        target.clear(CLEAR_COLOR);

        let cam = camera.state();
        self.block.set_f32(self.slots.time, tick.elapsed as f32);
        self.block.set_vec2(self.slots.cam_rot, [cam.pitch, cam.yaw]);
        self.block.set_f32(self.slots.cam_zoom, cam.zoom);
        self.block.set_f32(self.slots.sun_rot, camera.sun_rotation());
        target.write_uniforms(self.block.bytes());

        target.draw_quad(QUAD_VERTEX_COUNT);

        if let Some(fps) = tick.published_fps {
            log::debug!("FPS: {fps:.1}");
        }

        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::{ControllerSettings, InputEvent, Viewport},
        program::{
            tests::{MARS_FS, QUAD_VS},
            ProgramBuilder,
        },
    };
    use glam::Vec2;

    #[derive(Debug, PartialEq)]
    enum Call {
        Clear,
        Uniforms(Vec<u8>),
        Draw(u32),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl FrameTarget for Recorder {
        fn clear(&mut self, color: wgpu::Color) {
            assert_eq!(color, CLEAR_COLOR);
            self.calls.push(Call::Clear);
        }

        fn write_uniforms(&mut self, bytes: &[u8]) {
            self.calls.push(Call::Uniforms(bytes.to_vec()));
        }

        fn draw_quad(&mut self, vertex_count: u32) {
            self.calls.push(Call::Draw(vertex_count));
        }
    }

    fn scheduler() -> (FrameScheduler, UniformLocations) {
        let mut builder = ProgramBuilder::new();
        let program = builder.build(QUAD_VS, MARS_FS).unwrap();
        let locations = builder.resolve_uniforms(&program, &UNIFORM_NAMES);
        (FrameScheduler::new(&program, &locations), locations)
    }

    fn read_f32(bytes: &[u8], at: Option<UniformLocation>) -> f32 {
        let at = at.unwrap().offset as usize;
        f32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    fn read_vec2(bytes: &[u8], at: Option<UniformLocation>) -> [f32; 2] {
        let x = read_f32(bytes, at);
        let at = at.map(|l| UniformLocation {
            offset: l.offset + 4,
            ty: l.ty,
        });
        [x, read_f32(bytes, at)]
    }

    fn camera() -> CameraController {
        CameraController::new(
            ControllerSettings::default(),
            Viewport::square_pixels(800.0, 600.0),
        )
    }

    #[test]
    fn first_tick_has_zero_dt() {
        let mut clock = FrameClock::new();
        let first = clock.tick(12.5);
        assert_eq!(first.index, 0);
        assert_eq!(first.dt, 0.0);
        assert_eq!(first.elapsed, 0.0);

        let second = clock.tick(12.75);
        assert_eq!(second.index, 1);
        assert_eq!(second.dt, 0.25);
        assert_eq!(second.elapsed, 0.25);
    }

    #[test]
    fn backwards_timestamps_do_not_rewind() {
        let mut clock = FrameClock::new();
        clock.tick(1.0);
        clock.tick(2.0);
        let back = clock.tick(1.5);
        assert_eq!(back.dt, 0.0);

        let next = clock.tick(2.5);
        assert_eq!(next.dt, 0.5);
    }

    #[test]
    fn fps_publishes_once_per_interval() {
        let mut clock = FrameClock::new();
        let published: Vec<_> = (0..=8)
            .map(|i| clock.tick(i as f64 * 0.125).published_fps)
            .collect();

        assert_eq!(
            published,
            vec![None, None, None, None, Some(8.0), None, None, None, Some(8.0)]
        );
        assert_eq!(clock.fps(), Some(8.0));
    }

    #[test]
    fn fps_tracks_the_rate_of_the_last_window() {
        let mut clock = FrameClock::new();
        clock.tick(0.0);
        clock.tick(0.5);
        assert_eq!(clock.fps(), Some(2.0));

        for i in 1..=16 {
            clock.tick(0.5 + i as f64 * 0.03125);
        }
        assert_eq!(clock.fps(), Some(32.0));
    }

    #[test]
    fn frame_clears_then_writes_then_draws_six() {
        let (mut scheduler, _) = scheduler();
        let mut target = Recorder::default();
        scheduler.frame(0.0, &camera(), &mut target);

        assert_eq!(target.calls.len(), 3);
        assert_eq!(target.calls[0], Call::Clear);
        assert!(matches!(target.calls[1], Call::Uniforms(_)));
        assert_eq!(target.calls[2], Call::Draw(QUAD_VERTEX_COUNT));
    }

    #[test]
    fn frame_writes_time_and_camera() {
        let (mut scheduler, locations) = scheduler();
        let mut cam = camera();
        cam.handle(&InputEvent::Wheel { delta_y: -500.0 });
        cam.handle(&InputEvent::SliderInput { degrees: 180.0 });
        cam.handle(&InputEvent::PointerDown {
            position: Vec2::ZERO,
            primary: true,
        });
        cam.handle(&InputEvent::PointerMove {
            position: Vec2::new(200.0, 0.0),
        });

        let mut target = Recorder::default();
        scheduler.frame(3.0, &cam, &mut target);
        scheduler.frame(4.5, &cam, &mut target);

        let Some(Call::Uniforms(bytes)) = target.calls.get(4) else {
            panic!("no uniform write in the second frame");
        };
        let state = cam.state();

        assert_eq!(read_f32(bytes, locations.get(I_TIME)), 1.5);
        assert_eq!(read_f32(bytes, locations.get(CAM_ZOOM)), state.zoom);
        assert_eq!(read_f32(bytes, locations.get(SUN_ROT)), cam.sun_rotation());

        assert_eq!(
            read_vec2(bytes, locations.get(CAM_ROT)),
            [state.pitch, state.yaw]
        );
        assert!(state.yaw > 0.0);
    }

    #[test]
    fn static_uniforms_are_written_once_and_kept() {
        let (mut scheduler, locations) = scheduler();
        scheduler.write_static(StaticUniforms {
            resolution: [1280.0, 720.0],
            map_resolution: 4,
            radius_offset: marsmap::MARS_RADIUS_M,
        });

        let mut target = Recorder::default();
        scheduler.frame(0.0, &camera(), &mut target);
        let bytes = scheduler.uniform_bytes();

        assert_eq!(read_f32(bytes, locations.get(MARS_MAP_RES)), 4.0);
        assert_eq!(
            read_f32(bytes, locations.get(RADIUS_OFFSET)),
            marsmap::MARS_RADIUS_M as f32
        );
        assert_eq!(
            read_vec2(bytes, locations.get(I_RESOLUTION)),
            [1280.0, 720.0]
        );

        let data = locations.get(RADIUS_DATA).unwrap().offset as usize;
        assert_eq!(&bytes[data..data + 4], &0i32.to_le_bytes());

        scheduler.set_resolution([640.0, 480.0]);
        assert_eq!(
            read_vec2(scheduler.uniform_bytes(), locations.get(I_RESOLUTION)),
            [640.0, 480.0]
        );
    }

    #[test]
    fn program_without_uniforms_still_draws() {
        let fs = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let mut builder = ProgramBuilder::new();
        let program = builder.build(QUAD_VS, fs).unwrap();
        let locations = builder.resolve_uniforms(&program, &UNIFORM_NAMES);
        assert_eq!(locations.resolved(), 0);

        let mut scheduler = FrameScheduler::new(&program, &locations);
        let mut target = Recorder::default();
        scheduler.frame(0.0, &camera(), &mut target);

        assert_eq!(target.calls.last(), Some(&Call::Draw(QUAD_VERTEX_COUNT)));
    }
}
