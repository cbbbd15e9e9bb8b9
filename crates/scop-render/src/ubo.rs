// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Per-draw uniform block read by the mesh shaders (binding 0, std140).
/// `pos` is the mesh's world position, w = 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshUbo {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
    pub pos: Vec4,
}

impl MeshUbo {
    pub fn new(model: Mat4, view: Mat4, proj: Mat4, position: Vec3) -> Self {
        Self {
            model,
            view,
            proj,
            pos: position.extend(1.0),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for MeshUbo {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_bit_exact() {
        assert_eq!(std::mem::size_of::<MeshUbo>(), 208);
        assert_eq!(std::mem::offset_of!(MeshUbo, view), 64);
        assert_eq!(std::mem::offset_of!(MeshUbo, proj), 128);
        assert_eq!(std::mem::offset_of!(MeshUbo, pos), 192);
    }

    #[test]
    fn position_has_w_one() {
        let ubo = MeshUbo::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(ubo.pos, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(ubo.as_bytes().len(), 208);
    }
}
