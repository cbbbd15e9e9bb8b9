// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Quat, Vec3};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ScaleError {
    #[error("scale factor {0} would collapse the model")]
    Degenerate(f32),
}

/// Model transform: translation, rotation and a uniform scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

fn check_factor(factor: f32) -> Result<f32, ScaleError> {
    if factor == 0.0 || !factor.is_finite() {
        return Err(ScaleError::Degenerate(factor));
    }
    Ok(factor)
}

impl Transform {
    pub fn position(&self) -> Vec3 {
        self.position
    }
    pub fn rotation(&self) -> Quat {
        self.rotation
    }
    pub fn scale_factor(&self) -> f32 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Rotates around `axis` (any length) by `degrees`, in local space.
    pub fn rotate(&mut self, axis: Vec3, degrees: f32) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.rotation = (self.rotation * Quat::from_axis_angle(axis, degrees.to_radians())).normalize();
    }

    /// Replaces the scale factor. Zero and non-finite factors are rejected.
    pub fn set_scale(&mut self, factor: f32) -> Result<(), ScaleError> {
        self.scale = check_factor(factor)?;
        Ok(())
    }

    /// Multiplies the scale factor. Zero and non-finite factors are rejected.
    pub fn scale(&mut self, factor: f32) -> Result<(), ScaleError> {
        let next = self.scale * check_factor(factor)?;
        self.scale = check_factor(next)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.rotation, self.position)
    }
}
