// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Vec3};

const WORLD_UP: Vec3 = Vec3::Y;
const PITCH_LIMIT: f32 = 89.0;
const FOV_MIN: f32 = 1.0;
const FOV_MAX: f32 = 179.0;

/// Free-fly perspective camera. Angles are stored in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    position: Vec3,
    pitch: f32,
    yaw: f32,
    fov: f32,
    near: f32,
    far: f32,
    aspect: f32,

    front: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 0.0, -90.0)
    }
}

impl Camera {
    pub fn new(position: Vec3, pitch: f32, yaw: f32) -> Self {
        let mut cam = Self {
            position,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            yaw,
            fov: 80.0,
            near: 0.1,
            far: 1000.0,
            aspect: 16.0 / 9.0,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
        };
        cam.update_vectors();
        cam
    }

    pub fn with_clip(mut self, fov: f32, near: f32, far: f32) -> Self {
        self.set_fov(fov);
        self.near = near.max(f32::EPSILON);
        self.far = far.max(self.near + f32::EPSILON);
        self
    }

    fn update_vectors(&mut self) {
        let (pitch, yaw) = (self.pitch.to_radians(), self.yaw.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.front.cross(WORLD_UP).normalize();
        self.up = self.right.cross(self.front).normalize();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
    pub fn pitch(&self) -> f32 {
        self.pitch
    }
    pub fn yaw(&self) -> f32 {
        self.yaw
    }
    pub fn fov(&self) -> f32 {
        self.fov
    }
    pub fn aspect(&self) -> f32 {
        self.aspect
    }
    pub fn front(&self) -> Vec3 {
        self.front
    }
    pub fn right(&self) -> Vec3 {
        self.right
    }
    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn move_front(&mut self, amount: f32) {
        self.position += self.front * amount;
    }

    pub fn move_right(&mut self, amount: f32) {
        self.position += self.right * amount;
    }

    /// Moves along the world up axis so vertical motion ignores pitch.
    pub fn move_up(&mut self, amount: f32) {
        self.position += WORLD_UP * amount;
    }

    pub fn rotate_pitch(&mut self, degrees: f32) {
        self.pitch = (self.pitch + degrees).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    pub fn rotate_yaw(&mut self, degrees: f32) {
        self.yaw = (self.yaw + degrees).rem_euclid(360.0);
        self.update_vectors();
    }

    pub fn set_fov(&mut self, degrees: f32) {
        self.fov = degrees.clamp(FOV_MIN, FOV_MAX);
    }

    /// Recomputes the aspect ratio; a zero-sized window keeps the previous one.
    pub fn update_from_window(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Vulkan clip space: depth in [0, 1], Y pointing down.
    pub fn projection(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn status(&self) -> String {
        format!(
            "camera pos=({:.2}, {:.2}, {:.2}) pitch={:.2} yaw={:.2} fov={:.1}",
            self.position.x, self.position.y, self.position.z, self.pitch, self.yaw, self.fov
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn default_looks_down_negative_z() {
        let cam = Camera::default();
        assert!(approx(cam.front(), Vec3::NEG_Z));
        assert!(approx(cam.right(), Vec3::X));
        assert!(approx(cam.up(), Vec3::Y));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = Camera::default();
        cam.rotate_pitch(500.0);
        assert_eq!(cam.pitch(), PITCH_LIMIT);
        cam.rotate_pitch(-1000.0);
        assert_eq!(cam.pitch(), -PITCH_LIMIT);
        assert!(cam.front().is_finite());
    }

    #[test]
    fn fov_is_clamped() {
        let mut cam = Camera::default();
        cam.set_fov(-10.0);
        assert_eq!(cam.fov(), FOV_MIN);
        cam.set_fov(400.0);
        assert_eq!(cam.fov(), FOV_MAX);
    }

    #[test]
    fn zero_window_keeps_aspect() {
        let mut cam = Camera::default();
        cam.update_from_window(800, 600);
        let before = cam.aspect();
        cam.update_from_window(0, 0);
        assert_eq!(cam.aspect(), before);
        assert!((before - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn movement_follows_basis() {
        let mut cam = Camera::default();
        cam.move_front(2.0);
        cam.move_right(1.0);
        cam.move_up(3.0);
        assert!(approx(cam.position(), Vec3::new(1.0, 3.0, -2.0)));
    }

    #[test]
    fn projection_flips_y() {
        let cam = Camera::default();
        assert!(cam.projection().y_axis.y < 0.0);
    }
}
