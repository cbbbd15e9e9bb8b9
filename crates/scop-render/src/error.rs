// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("texture `{0}` is already registered")]
    DuplicateTexture(String),
    #[error("image `{0}` is already registered")]
    DuplicateImage(String),
    #[error("no texture registered as `{0}`")]
    UnknownTexture(String),
    #[error("no image registered as `{0}`")]
    UnknownImage(String),
    #[error("failed to decode texture {path}")]
    TextureDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture {width}x{height} needs {expected} bytes of RGBA8, got {actual}")]
    TextureSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("vertex data of {len} bytes is not a multiple of the {stride} byte stride")]
    VertexStride { len: usize, stride: u32 },
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: u32 },
}
