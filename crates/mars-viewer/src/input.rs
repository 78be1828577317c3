//! winit window events → [`InputEvent`].

use crate::camera::InputEvent;
use glam::Vec2;
use std::collections::BTreeMap;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent};

/// Pixels per wheel line, so line and pixel scrolling share one sensitivity.
pub const WHEEL_LINE_PX: f32 = 100.0;

/// Tracks the cursor and active touches so every emitted event is self-contained.
#[derive(Debug, Default)]
pub struct InputTranslator {
    cursor: Option<Vec2>,
    touches: BTreeMap<u64, Vec2>,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_touches(&self) -> usize {
        self.touches.len()
    }

    pub fn translate(&mut self, event: &WindowEvent) -> Option<InputEvent> {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                self.cursor = Some(position);
                Some(InputEvent::PointerMove { position })
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                None
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => Some(InputEvent::PointerDown {
                    position: self.cursor?,
                    primary: *button == MouseButton::Left,
                }),
                ElementState::Released if *button == MouseButton::Left => {
                    Some(InputEvent::PointerUp)
                }
                ElementState::Released => None,
            },
            WindowEvent::MouseWheel { delta, .. } => {
                // winit reports positive y when scrolling away from the user.
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * WHEEL_LINE_PX,
                    MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
                };
                Some(InputEvent::Wheel { delta_y })
            }
            WindowEvent::Touch(touch) => self.touch(touch),
            _ => None,
        }
    }

    fn touch(&mut self, touch: &Touch) -> Option<InputEvent> {
        let position = Vec2::new(touch.location.x as f32, touch.location.y as f32);

        match touch.phase {
            TouchPhase::Started => {
                self.touches.insert(touch.id, position);
                Some(InputEvent::TouchStart {
                    touches: self.snapshot(),
                })
            }
            TouchPhase::Moved => {
                *self.touches.get_mut(&touch.id)? = position;
                Some(InputEvent::TouchMove {
                    touches: self.snapshot(),
                })
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                self.touches.remove(&touch.id)?;
                Some(InputEvent::TouchEnd {
                    touches: self.snapshot(),
                })
            }
        }
    }

    fn snapshot(&self) -> Vec<Vec2> {
        self.touches.values().copied().collect()
    }
}
