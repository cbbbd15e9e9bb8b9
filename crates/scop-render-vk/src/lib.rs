// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device bring-up, swapchain and frame protocol, staging
//! uploads, pipelines with their descriptors.

mod command_pool;
mod context;
mod debug;
mod engine;
mod error;
mod mesh;
mod presenter;
mod shader;
mod swapchain;
mod sync;
mod texture;
pub mod upload;
pub mod utils;

pub use command_pool::CommandPool;
pub use context::{DeviceContext, DeviceOptions, DeviceSupport, Surface};
pub use engine::{Engine, EngineConfig};
pub use error::VkError;
pub use mesh::Mesh;
pub use presenter::{FrameToken, Presenter};
pub use shader::{parse_spirv, Shader, ShaderDesc, ShaderSource};
pub use swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, ResizeGate,
    SwapchainState, PREFERRED_SURFACE_FORMAT,
};
pub use sync::{FrameCursor, FramePhase, FrameSync};
pub use texture::{SampledImage, TextureManager, TEXTURE_FORMAT};

/// Built-in mesh vertex shader (SPIR-V, compiled by build.rs).
pub const MESH_VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mesh.vert.spv"));
/// Built-in mesh fragment shader (SPIR-V, compiled by build.rs).
pub const MESH_FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mesh.frag.spv"));
