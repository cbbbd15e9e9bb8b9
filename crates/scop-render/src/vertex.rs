// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};

/// Shader input formats the pipeline builder knows how to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    Float,
    Float2,
    Float3,
    Float4,
}

impl AttributeFormat {
    pub fn size(self) -> u32 {
        4 * match self {
            Self::Float => 1,
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    pub offset: u32,
}

/// Interleaved single-binding vertex layout, carried as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Packs `formats` back to back at locations 0, 1, 2...
    pub fn packed(formats: &[AttributeFormat]) -> Self {
        let mut offset = 0;
        let attributes = formats
            .iter()
            .enumerate()
            .map(|(location, &format)| {
                let attr = VertexAttribute {
                    location: location as u32,
                    format,
                    offset,
                };
                offset += format.size();
                attr
            })
            .collect();
        Self {
            stride: offset,
            attributes,
        }
    }
}

/// A POD vertex that can describe its own layout.
pub trait VertexType: Pod {
    fn layout() -> VertexLayout;
}

/// Position, normal, texture coordinate.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub nrm: [f32; 3],
    pub tex: [f32; 2],
}

impl Vertex {
    pub const fn new(pos: [f32; 3], nrm: [f32; 3], tex: [f32; 2]) -> Self {
        Self { pos, nrm, tex }
    }
}

impl VertexType for Vertex {
    fn layout() -> VertexLayout {
        use AttributeFormat::*;
        VertexLayout::packed(&[Float3, Float3, Float2])
    }
}

/// Position and normal only, for untextured meshes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexPos {
    pub pos: [f32; 3],
    pub nrm: [f32; 3],
}

impl VertexPos {
    pub const fn new(pos: [f32; 3], nrm: [f32; 3]) -> Self {
        Self { pos, nrm }
    }
}

impl VertexType for VertexPos {
    fn layout() -> VertexLayout {
        use AttributeFormat::*;
        VertexLayout::packed(&[Float3, Float3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_struct() {
        let layout = Vertex::layout();
        assert_eq!(layout.stride as usize, std::mem::size_of::<Vertex>());
        let offsets: Vec<u32> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        let locations: Vec<u32> = layout.attributes.iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
    }

    #[test]
    fn position_normal_layout() {
        let layout = VertexPos::layout();
        assert_eq!(layout.stride, 24);
        assert_eq!(layout.stride as usize, std::mem::size_of::<VertexPos>());
        let got: Vec<(u32, u32)> = layout.attributes.iter().map(|a| (a.location, a.offset)).collect();
        assert_eq!(got, vec![(0, 0), (1, 12)]);
    }

    #[test]
    fn packed_empty_layout() {
        let layout = VertexLayout::packed(&[]);
        assert_eq!(layout.stride, 0);
        assert!(layout.attributes.is_empty());
    }
}
