// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

mod camera;
mod transform;

pub use camera::Camera;
pub use glam;
pub use transform::{ScaleError, Transform};
