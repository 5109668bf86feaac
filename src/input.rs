//! Raw input fan-out.
//!
//! Behaviours register callbacks once and receive every key, pointer and
//! button event afterwards. Handlers are only ever appended and run in the
//! order they were registered.

use winit::{
    event::{ElementState, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyInput {
    pub key: KeyCode,
    pub pressed: bool,
    pub repeat: bool,
}

/// Cursor position in physical pixels and its motion since the last event.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointerInput {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ButtonInput {
    pub button: MouseButton,
    pub pressed: bool,
}

type Handler<E> = Box<dyn FnMut(&E)>;

#[derive(Default)]
pub struct InputHandlers {
    keys: Vec<Handler<KeyInput>>,
    pointers: Vec<Handler<PointerInput>>,
    buttons: Vec<Handler<ButtonInput>>,
    cursor: Option<(f64, f64)>,
}

impl InputHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key(&mut self, handler: impl FnMut(&KeyInput) + 'static) {
        self.keys.push(Box::new(handler));
    }

    pub fn on_pointer(&mut self, handler: impl FnMut(&PointerInput) + 'static) {
        self.pointers.push(Box::new(handler));
    }

    pub fn on_button(&mut self, handler: impl FnMut(&ButtonInput) + 'static) {
        self.buttons.push(Box::new(handler));
    }

    pub fn dispatch_key(&mut self, input: KeyInput) {
        self.keys.iter_mut().for_each(|handler| handler(&input));
    }

    pub fn dispatch_pointer(&mut self, input: PointerInput) {
        self.pointers.iter_mut().for_each(|handler| handler(&input));
    }

    pub fn dispatch_button(&mut self, input: ButtonInput) {
        self.buttons.iter_mut().for_each(|handler| handler(&input));
    }

    /// Moves the cursor to `(x, y)` and dispatches the motion. The first
    /// position reported has no motion.
    pub fn move_pointer(&mut self, x: f64, y: f64) {
        let (dx, dy) = match self.cursor {
            Some((last_x, last_y)) => (x - last_x, y - last_y),
            None => (0.0, 0.0),
        };
        self.cursor = Some((x, y));
        self.dispatch_pointer(PointerInput { x, y, dx, dy });
    }

    pub fn handler_count(&self) -> usize {
        self.keys.len() + self.pointers.len() + self.buttons.len()
    }

    /// Translates the window events handlers care about.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.dispatch_key(KeyInput {
                        key,
                        pressed: event.state == ElementState::Pressed,
                        repeat: event.repeat,
                    });
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.move_pointer(position.x, position.y),
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::MouseInput { state, button, .. } => self.dispatch_button(ButtonInput {
                button: *button,
                pressed: *state == ElementState::Pressed,
            }),
            _ => {}
        }
    }
}

impl std::fmt::Debug for InputHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputHandlers")
            .field("keys", &self.keys.len())
            .field("pointers", &self.pointers.len())
            .field("buttons", &self.buttons.len())
            .finish()
    }
}
