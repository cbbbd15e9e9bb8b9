// SPDX-License-Identifier: CEPL-1.0
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use winit::{
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

const PIXELS_PER_LINE: f32 = 40.0;

/// Edge-detected state of one key or button for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub down: bool,
    pub pressed: bool,
    pub released: bool,
}

impl KeyState {
    fn update(&mut self, is_down: bool) {
        self.pressed = is_down && !self.down;
        self.released = !is_down && self.down;
        self.down = is_down;
    }
}

/// Raw "is it held" set plus the per-frame edge states derived from it.
#[derive(Debug)]
struct Tracker<K> {
    held: HashSet<K>,
    states: HashMap<K, KeyState>,
}

impl<K> Default for Tracker<K> {
    fn default() -> Self {
        Self {
            held: HashSet::new(),
            states: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> Tracker<K> {
    fn set(&mut self, key: K, down: bool) {
        if down {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
        }
    }

    fn update(&mut self) {
        for &k in &self.held {
            self.states.entry(k).or_default();
        }
        for (k, state) in self.states.iter_mut() {
            state.update(self.held.contains(k));
        }
        self.states.retain(|_, s| s.down || s.released);
    }

    fn state(&self, key: K) -> KeyState {
        self.states.get(&key).copied().unwrap_or_default()
    }
}

/// Keyboard, mouse and scroll state, fed by window events and sampled once
/// per frame through [`InputManager::update`].
#[derive(Debug, Default)]
pub struct InputManager {
    keys: Tracker<KeyCode>,
    buttons: Tracker<MouseButton>,
    cursor: (f64, f64),
    last_cursor: (f64, f64),
    cursor_delta: (f64, f64),
    pending_scroll: f32,
    scroll: f32,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records raw state from a window event. Returns true if it was input.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.set_key(code, event.state == ElementState::Pressed);
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.set_button(*button, *state == ElementState::Pressed);
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x, position.y);
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                self.add_scroll(lines);
                true
            }
            WindowEvent::Focused(false) => {
                self.release_all();
                false
            }
            _ => false,
        }
    }

    pub fn set_key(&mut self, key: KeyCode, down: bool) {
        self.keys.set(key, down);
    }

    pub fn set_button(&mut self, button: MouseButton, down: bool) {
        self.buttons.set(button, down);
    }

    pub fn add_scroll(&mut self, lines: f32) {
        self.pending_scroll += lines;
    }

    /// Lost focus means missed release events; drop everything held.
    pub fn release_all(&mut self) {
        self.keys.held.clear();
        self.buttons.held.clear();
    }

    /// Advances one frame: computes edges and consumes accumulated scroll.
    pub fn update(&mut self) {
        self.keys.update();
        self.buttons.update();
        self.cursor_delta = (
            self.cursor.0 - self.last_cursor.0,
            self.cursor.1 - self.last_cursor.1,
        );
        self.last_cursor = self.cursor;
        self.scroll = std::mem::take(&mut self.pending_scroll);
    }

    pub fn key(&self, key: KeyCode) -> KeyState {
        self.keys.state(key)
    }
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.key(key).down
    }
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.key(key).pressed
    }
    pub fn key_released(&self, key: KeyCode) -> bool {
        self.key(key).released
    }

    pub fn button(&self, button: MouseButton) -> KeyState {
        self.buttons.state(button)
    }

    pub fn cursor_position(&self) -> (f64, f64) {
        self.cursor
    }

    pub fn cursor_delta(&self) -> (f64, f64) {
        self.cursor_delta
    }

    /// Scroll accumulated between the last two `update` calls.
    pub fn scroll(&self) -> f32 {
        self.scroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_edges_last_one_frame() {
        let mut input = InputManager::new();
        input.set_key(KeyCode::KeyW, true);
        input.update();
        assert_eq!(
            input.key(KeyCode::KeyW),
            KeyState {
                down: true,
                pressed: true,
                released: false
            }
        );

        input.update();
        assert!(input.key_down(KeyCode::KeyW));
        assert!(!input.key_pressed(KeyCode::KeyW));

        input.set_key(KeyCode::KeyW, false);
        input.update();
        assert!(input.key_released(KeyCode::KeyW));
        assert!(!input.key_down(KeyCode::KeyW));

        input.update();
        assert_eq!(input.key(KeyCode::KeyW), KeyState::default());
    }

    #[test]
    fn tap_between_frames_is_missed_without_crash() {
        let mut input = InputManager::new();
        input.set_key(KeyCode::Space, true);
        input.set_key(KeyCode::Space, false);
        input.update();
        assert_eq!(input.key(KeyCode::Space), KeyState::default());
    }

    #[test]
    fn scroll_accumulates_then_resets() {
        let mut input = InputManager::new();
        input.add_scroll(1.0);
        input.add_scroll(2.5);
        assert_eq!(input.scroll(), 0.0);

        input.update();
        assert_eq!(input.scroll(), 3.5);

        input.update();
        assert_eq!(input.scroll(), 0.0);
    }

    #[test]
    fn release_all_emits_released_edges() {
        let mut input = InputManager::new();
        input.set_button(MouseButton::Right, true);
        input.set_key(KeyCode::ArrowUp, true);
        input.update();

        input.release_all();
        input.update();
        assert!(input.button(MouseButton::Right).released);
        assert!(input.key_released(KeyCode::ArrowUp));
    }
}
