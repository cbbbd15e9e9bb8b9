// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic rendering types shared by the Vulkan backend and the app.
#![deny(unsafe_op_in_unsafe_fn)]

mod error;
mod lifecycle;
mod mesh;
mod options;
mod schema;
mod texture;
mod ubo;
mod vertex;

pub use error::RenderError;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use mesh::MeshData;
pub use options::{FaceCulling, PolygonMode, PresentPreference, SamplerFilter};
pub use schema::{BindingDesc, BindingKind, DescriptorSchema, ShaderStages, UboSlot};
pub use texture::Texture;
pub use ubo::MeshUbo;
pub use vertex::{AttributeFormat, Vertex, VertexAttribute, VertexLayout, VertexPos, VertexType};

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Number of frame slots the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What the renderer needs from the platform window.
pub trait WindowSurface: HasWindowHandle + HasDisplayHandle {
    /// Current drawable size in physical pixels; zero while minimized.
    fn framebuffer_size(&self) -> RenderSize;
}
