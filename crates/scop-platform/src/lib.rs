// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

mod input;
mod window;

pub use input::{InputManager, KeyState};
pub use window::PlatformWindow;
pub use winit;
