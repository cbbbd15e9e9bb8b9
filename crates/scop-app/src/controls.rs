// SPDX-License-Identifier: CEPL-1.0
use scop_math::Camera;
use scop_platform::winit::{event::MouseButton, keyboard::KeyCode};
use scop_platform::InputManager;

use crate::config::CameraCfg;

/// FOV change per scroll line, degrees.
const FOV_STEP: f32 = 2.0;

/// One-shot requests raised by this frame's input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Actions {
    pub exit: bool,
    pub print_status: bool,
    pub toggle_cursor: bool,
}

/// Applies held keys to the camera for `dt` seconds and reports the edges.
pub fn apply(camera: &mut Camera, input: &InputManager, cfg: &CameraCfg, dt: f32) -> Actions {
    let axis = |pos: KeyCode, neg: KeyCode| -> f32 {
        input.key_down(pos) as i32 as f32 - input.key_down(neg) as i32 as f32
    };

    let mut speed = cfg.speed * dt;
    if input.key_down(KeyCode::ControlLeft) {
        speed *= cfg.sprint;
    }
    let forward = axis(KeyCode::KeyW, KeyCode::KeyS);
    let strafe = axis(KeyCode::KeyD, KeyCode::KeyA);
    let lift = axis(KeyCode::Space, KeyCode::ShiftLeft);
    if forward != 0.0 {
        camera.move_front(forward * speed);
    }
    if strafe != 0.0 {
        camera.move_right(strafe * speed);
    }
    if lift != 0.0 {
        camera.move_up(lift * speed);
    }

    let turn = cfg.rotate_speed * dt;
    let pitch = axis(KeyCode::ArrowUp, KeyCode::ArrowDown);
    let yaw = axis(KeyCode::ArrowRight, KeyCode::ArrowLeft);
    if pitch != 0.0 {
        camera.rotate_pitch(pitch * turn);
    }
    if yaw != 0.0 {
        camera.rotate_yaw(yaw * turn);
    }

    let scroll = input.scroll();
    if scroll != 0.0 {
        camera.set_fov(camera.fov() - scroll * FOV_STEP);
    }

    Actions {
        exit: input.key_pressed(KeyCode::Escape),
        print_status: input.key_pressed(KeyCode::KeyP),
        toggle_cursor: input.button(MouseButton::Right).pressed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scop_math::glam::Vec3;

    fn setup() -> (Camera, InputManager, CameraCfg) {
        let cfg = CameraCfg {
            speed: 2.0,
            sprint: 5.0,
            rotate_speed: 45.0,
            ..CameraCfg::default()
        };
        (Camera::default(), InputManager::new(), cfg)
    }

    #[test]
    fn w_moves_forward_and_ctrl_sprints() {
        let (mut cam, mut input, cfg) = setup();
        input.set_key(KeyCode::KeyW, true);
        input.update();
        apply(&mut cam, &input, &cfg, 0.5);
        assert!((cam.position() - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);

        input.set_key(KeyCode::ControlLeft, true);
        input.update();
        apply(&mut cam, &input, &cfg, 0.5);
        assert!((cam.position() - Vec3::new(0.0, 0.0, -6.0)).length() < 1e-4);
    }

    #[test]
    fn opposite_keys_cancel() {
        let (mut cam, mut input, cfg) = setup();
        input.set_key(KeyCode::KeyA, true);
        input.set_key(KeyCode::KeyD, true);
        input.update();
        apply(&mut cam, &input, &cfg, 1.0);
        assert_eq!(cam.position(), Vec3::ZERO);
    }

    #[test]
    fn arrows_rotate_at_configured_rate() {
        let (mut cam, mut input, cfg) = setup();
        input.set_key(KeyCode::ArrowUp, true);
        input.update();
        apply(&mut cam, &input, &cfg, 0.5);
        assert!((cam.pitch() - 22.5).abs() < 1e-4);
    }

    #[test]
    fn scroll_narrows_fov() {
        let (mut cam, mut input, cfg) = setup();
        let before = cam.fov();
        input.add_scroll(3.0);
        input.update();
        apply(&mut cam, &input, &cfg, 0.016);
        assert!((cam.fov() - (before - 6.0)).abs() < 1e-4);

        // consumed: next frame leaves fov alone
        input.update();
        apply(&mut cam, &input, &cfg, 0.016);
        assert!((cam.fov() - (before - 6.0)).abs() < 1e-4);
    }

    #[test]
    fn edge_actions_fire_once() {
        let (mut cam, mut input, cfg) = setup();
        input.set_key(KeyCode::Escape, true);
        input.set_key(KeyCode::KeyP, true);
        input.set_button(MouseButton::Right, true);
        input.update();
        let first = apply(&mut cam, &input, &cfg, 0.016);
        assert_eq!(
            first,
            Actions {
                exit: true,
                print_status: true,
                toggle_cursor: true
            }
        );

        input.update();
        assert_eq!(apply(&mut cam, &input, &cfg, 0.016), Actions::default());
    }
}
