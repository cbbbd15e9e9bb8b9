// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;

/// Typed failures of the Vulkan layer. Everything else travels as
/// `anyhow::Error` with context.
#[derive(Debug, Error)]
pub enum VkError {
    #[error("no physical device supports the swapchain, graphics/present queues and anisotropic sampling")]
    NoSuitableDevice,
    #[error("validation layer {0} requested but not installed")]
    MissingValidationLayer(String),
    #[error("no memory type matches bits {type_bits:#x} with {required:?}")]
    NoMemoryType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },
    #[error("none of the depth formats supports depth-stencil attachment")]
    NoDepthFormat,
    #[error("surface reports no formats")]
    NoSurfaceFormat,
    #[error("unsupported layout transition {from:?} -> {to:?}")]
    UnsupportedTransition {
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    },
    #[error("command pool used before it was created")]
    PoolNotCreated,
    #[error("zero-length upload")]
    EmptyUpload,
    #[error("uniform slot {0} has zero size")]
    EmptyUniform(usize),
    #[error("{len} bytes do not fit uniform slot of {size} bytes")]
    UniformOverflow { len: usize, size: usize },
    #[error("invalid SPIR-V: {0}")]
    InvalidSpirv(&'static str),
    #[error("mesh has no GPU buffers; call create_buffers first")]
    MeshNotUploaded,
    #[error("frame is {actual}, expected {expected}")]
    FrameOrder {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("swapchain is not live")]
    NoSwapchain,
}
