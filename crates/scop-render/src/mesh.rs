// SPDX-License-Identifier: CEPL-1.0
use crate::{RenderError, VertexLayout, VertexType};

/// CPU-side geometry: interleaved vertex bytes, their layout, u32 indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    vertices: Vec<u8>,
    vertex_count: u32,
    layout: VertexLayout,
    indices: Vec<u32>,
}

impl MeshData {
    pub fn new<V: VertexType>(vertices: &[V], indices: Vec<u32>) -> Result<Self, RenderError> {
        Self::from_raw(bytemuck::cast_slice(vertices).to_vec(), V::layout(), indices)
    }

    pub fn from_raw(
        vertices: Vec<u8>,
        layout: VertexLayout,
        indices: Vec<u32>,
    ) -> Result<Self, RenderError> {
        let stride = layout.stride;
        if stride == 0 || vertices.len() % stride as usize != 0 {
            return Err(RenderError::VertexStride {
                len: vertices.len(),
                stride,
            });
        }
        let vertex_count = (vertices.len() / stride as usize) as u32;
        if let Some(&index) = indices.iter().find(|&&i| i >= vertex_count) {
            return Err(RenderError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(Self {
            vertices,
            vertex_count,
            layout,
            indices,
        })
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Vertex, VertexPos};

    fn tri() -> Vec<Vertex> {
        vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ]
    }

    #[test]
    fn sizes_follow_layout() {
        let mesh = MeshData::new(&tri(), vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.vertex_bytes().len(), 3 * 32);
        assert_eq!(mesh.index_bytes().len(), 12);
        assert!(!mesh.is_empty());
    }

    #[test]
    fn untextured_vertices_carry_their_own_layout() {
        let verts = [
            VertexPos::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            VertexPos::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            VertexPos::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ];
        let mesh = MeshData::new(&verts, vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.layout().stride, 24);
        assert_eq!(mesh.vertex_bytes().len(), 3 * 24);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let err = MeshData::new(&tri(), vec![0, 1, 3]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            }
        ));
    }

    #[test]
    fn rejects_partial_vertex() {
        let layout = Vertex::layout();
        let err = MeshData::from_raw(vec![0; 33], layout, vec![]).unwrap_err();
        assert!(matches!(err, RenderError::VertexStride { len: 33, stride: 32 }));
    }
}
