// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use ash::vk;
use scop_math::Transform;
use scop_render::{Lifecycle, MeshData};
use tracing::{debug, warn};

use crate::upload;
use crate::utils::GpuBuffer;
use crate::{CommandPool, VkError};

/// Geometry plus its model transform and (once uploaded) device-local
/// vertex/index buffers.
pub struct Mesh {
    data: MeshData,
    transform: Transform,
    vertex_buffer: Lifecycle<GpuBuffer>,
    index_buffer: Lifecycle<GpuBuffer>,
}

impl Mesh {
    pub fn new(data: MeshData) -> Self {
        Self {
            data,
            transform: Transform::default(),
            vertex_buffer: Lifecycle::Uninitialized,
            index_buffer: Lifecycle::Uninitialized,
        }
    }

    /// Replaces the geometry. Old GPU buffers are released and the transform
    /// is reset; call `create_buffers` again before drawing.
    pub fn load_mesh(&mut self, device: &ash::Device, data: MeshData) {
        self.destroy_buffers(device);
        self.data = data;
        self.transform.reset();
    }

    /// Uploads vertex and index data into device-local buffers, releasing
    /// any previous pair first.
    pub fn create_buffers(&mut self, pool: &CommandPool) -> Result<()> {
        self.destroy_buffers(pool.device());

        let vertices = upload::upload_buffer(
            pool,
            self.data.vertex_bytes(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let indices = match upload::upload_buffer(
            pool,
            self.data.index_bytes(),
            vk::BufferUsageFlags::INDEX_BUFFER,
        ) {
            Ok(b) => b,
            Err(e) => {
                unsafe { vertices.destroy(pool.device()) };
                return Err(e);
            }
        };

        let device = pool.device();
        self.vertex_buffer
            .replace_with(vertices, |old| unsafe { old.destroy(device) });
        self.index_buffer
            .replace_with(indices, |old| unsafe { old.destroy(device) });
        debug!(
            "mesh buffers: {} vertices, {} indices",
            self.data.vertex_count(),
            self.data.index_count()
        );
        Ok(())
    }

    /// Safe to call any number of times.
    pub fn destroy_buffers(&mut self, device: &ash::Device) {
        unsafe {
            if let Some(b) = self.vertex_buffer.take_live() {
                b.destroy(device);
            }
            if let Some(b) = self.index_buffer.take_live() {
                b.destroy(device);
            }
        }
    }

    pub fn has_buffers(&self) -> bool {
        self.vertex_buffer.is_live() && self.index_buffer.is_live()
    }

    pub(crate) fn buffers(&self) -> Result<(vk::Buffer, vk::Buffer), VkError> {
        match (self.vertex_buffer.live(), self.index_buffer.live()) {
            (Some(v), Some(i)) => Ok((v.buffer, i.buffer)),
            _ => Err(VkError::MeshNotUploaded),
        }
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn index_count(&self) -> u32 {
        self.data.index_count()
    }

    /// Reads both buffers back and compares them with the CPU copy.
    pub fn verify_upload(&self, pool: &CommandPool) -> Result<bool> {
        let (Some(vb), Some(ib)) = (self.vertex_buffer.live(), self.index_buffer.live()) else {
            return Err(VkError::MeshNotUploaded.into());
        };
        let vertices = upload::download_buffer(pool, vb)?;
        let indices = upload::download_buffer(pool, ib)?;
        let ok = vertices == self.data.vertex_bytes() && indices == self.data.index_bytes();
        if !ok {
            warn!("mesh upload mismatch");
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scop_math::glam::Vec3;
    use scop_render::Vertex;

    fn triangle() -> MeshData {
        let v = [
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ];
        MeshData::new(&v, vec![0, 1, 2]).unwrap()
    }

    #[test]
    fn fresh_mesh_has_no_buffers() {
        let mesh = Mesh::new(triangle());
        assert!(!mesh.has_buffers());
        assert_eq!(mesh.index_count(), 3);
        assert!(matches!(mesh.buffers(), Err(VkError::MeshNotUploaded)));
    }

    #[test]
    fn transform_is_mutable_through_mesh() {
        let mut mesh = Mesh::new(triangle());
        mesh.transform_mut().translate(Vec3::X);
        assert_eq!(mesh.transform().position(), Vec3::X);
    }
}
