//! Ready-made behaviours.

use std::{cell::RefCell, rc::Rc};

use cgmath::{InnerSpace, Zero};
use winit::{event::MouseButton, keyboard::KeyCode};

use crate::{
    data_structures::scene_graph::{Behaviour, BehaviourContext},
    input::InputHandlers,
    math::{self, Vec3},
};

/// Input state shared between the registered handlers and the controller.
#[derive(Debug, Default)]
pub struct FlyInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub boost: bool,
    pub looking: bool,
    /// Pointer motion accumulated since the last update.
    pub look: (f64, f64),
}

/// Free-flight camera control.
///
/// WASD moves along the object's own basis, Space and Shift move along it
/// vertically and Ctrl multiplies the speed. Dragging with the right mouse
/// button yaws around the world up axis and pitches around the object's
/// right axis.
#[derive(Debug)]
pub struct FlyController {
    input: Rc<RefCell<FlyInput>>,
    /// Units per second.
    pub speed: f32,
    pub boost: f32,
    /// Degrees per pixel of pointer motion.
    pub sensitivity: f32,
}

impl FlyController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            input: Rc::new(RefCell::new(FlyInput::default())),
            speed,
            boost: 3.0,
            sensitivity,
        }
    }

    pub fn input(&self) -> Rc<RefCell<FlyInput>> {
        self.input.clone()
    }

    /// Hooks the controller up to raw input.
    pub fn register(&self, handlers: &mut InputHandlers) {
        let input = self.input.clone();
        handlers.on_key(move |key| {
            let mut input = input.borrow_mut();
            let flag = match key.key {
                KeyCode::KeyW => &mut input.forward,
                KeyCode::KeyS => &mut input.back,
                KeyCode::KeyA => &mut input.left,
                KeyCode::KeyD => &mut input.right,
                KeyCode::Space => &mut input.up,
                KeyCode::ShiftLeft | KeyCode::ShiftRight => &mut input.down,
                KeyCode::ControlLeft | KeyCode::ControlRight => &mut input.boost,
                _ => return,
            };
            *flag = key.pressed;
        });

        let input = self.input.clone();
        handlers.on_button(move |button| {
            if button.button == MouseButton::Right {
                input.borrow_mut().looking = button.pressed;
            }
        });

        let input = self.input.clone();
        handlers.on_pointer(move |pointer| {
            let mut input = input.borrow_mut();
            if input.looking {
                input.look.0 += pointer.dx;
                input.look.1 += pointer.dy;
            }
        });
    }
}

impl Default for FlyController {
    fn default() -> Self {
        Self::new(5.0, 0.2)
    }
}

impl Behaviour for FlyController {
    fn update(&mut self, ctx: &mut BehaviourContext<'_>) {
        let mut input = self.input.borrow_mut();
        let transform = ctx.transform;

        let mut direction = Vec3::zero();
        let axes = [
            (input.forward, transform.forward()),
            (input.back, -transform.forward()),
            (input.right, transform.right()),
            (input.left, -transform.right()),
            (input.up, transform.up()),
            (input.down, -transform.up()),
        ];
        for (active, axis) in axes {
            if active {
                direction += axis;
            }
        }
        if direction.magnitude2() > f32::EPSILON {
            let speed = match input.boost {
                true => self.speed * self.boost,
                false => self.speed,
            };
            transform.translate_world(direction.normalize() * speed * ctx.frame.delta);
        }

        let (dx, dy) = std::mem::take(&mut input.look);
        if dx != 0.0 || dy != 0.0 {
            let yaw = math::axis_angle(math::UP, dx as f32 * self.sensitivity);
            let pitch = math::axis_angle(transform.right(), dy as f32 * self.sensitivity);
            transform.rotate(yaw * pitch);
        }
    }

    fn name(&self) -> &str {
        "FlyController"
    }
}
