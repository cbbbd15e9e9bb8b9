// SPDX-License-Identifier: CEPL-1.0
use scop_math::glam::Vec3;
use scop_math::{Camera, Transform};
use scop_render::{MeshData, MeshUbo, RenderError, Vertex};

/// (outward normal, right, up) per face; right x up == normal.
const FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
];

/// Unit cube centred on the origin: four vertices per face so every face
/// has its own normal and full [0, 1] UVs; counter-clockwise from outside.
pub fn cube() -> Result<MeshData, RenderError> {
    const CORNERS: [(f32, f32, [f32; 2]); 4] = [
        (-1.0, -1.0, [0.0, 1.0]),
        (1.0, -1.0, [1.0, 1.0]),
        (1.0, 1.0, [1.0, 0.0]),
        (-1.0, 1.0, [0.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, right, up) in FACES {
        let base = vertices.len() as u32;
        for (su, sv, uv) in CORNERS {
            let pos = (normal + right * su + up * sv) * 0.5;
            vertices.push(Vertex::new(pos.to_array(), normal.to_array(), uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    MeshData::new(&vertices, indices)
}

/// Turns the model around Y by `speed` degrees per second.
pub fn spin(transform: &mut Transform, speed: f32, dt: f32) {
    if speed != 0.0 {
        transform.rotate(Vec3::Y, speed * dt);
    }
}

/// Matrices for one draw; `pos` carries the mesh position.
pub fn mesh_ubo(transform: &Transform, camera: &Camera) -> MeshUbo {
    MeshUbo::new(
        transform.matrix(),
        camera.view(),
        camera.projection(),
        transform.position(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scop_math::glam::Vec4;

    fn vertex_at(mesh: &MeshData, i: u32) -> Vertex {
        let stride = std::mem::size_of::<Vertex>();
        let start = i as usize * stride;
        bytemuck::pod_read_unaligned(&mesh.vertex_bytes()[start..start + stride])
    }

    #[test]
    fn cube_has_24_vertices_and_36_indices() {
        let mesh = cube().unwrap();
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
    }

    #[test]
    fn cube_triangles_face_outward() {
        let mesh = cube().unwrap();
        for tri in mesh.indices().chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| vertex_at(&mesh, i));
            let (pa, pb, pc) = (Vec3::from(a.pos), Vec3::from(b.pos), Vec3::from(c.pos));
            let winding = (pb - pa).cross(pc - pa);
            assert!(winding.dot(Vec3::from(a.nrm)) > 0.0);
            assert!(pa.abs().max_element() <= 0.5 + f32::EPSILON);
        }
    }

    #[test]
    fn spin_rotates_about_y() {
        let mut t = Transform::default();
        spin(&mut t, 90.0, 1.0);
        let x = t.matrix().transform_vector3(Vec3::X);
        assert!((x - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn ubo_pos_is_mesh_translation() {
        let mut t = Transform::default();
        t.set_position(Vec3::new(2.0, -1.0, 4.0));
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), 0.0, -90.0);
        let ubo = mesh_ubo(&t, &camera);
        assert_eq!(ubo.pos, Vec4::new(2.0, -1.0, 4.0, 1.0));
        assert_eq!(ubo.model, t.matrix());
        assert_eq!(ubo.view, camera.view());
    }

    #[test]
    fn zero_spin_leaves_transform() {
        let mut t = Transform::default();
        spin(&mut t, 0.0, 1.0);
        assert_eq!(t, Transform::default());
    }
}
