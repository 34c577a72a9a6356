use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use pixelscene_ecs::MeshKind;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Indexed triangle list with counter-clockwise front faces.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl Mesh {
    pub fn for_kind(kind: MeshKind) -> Self {
        match kind {
            MeshKind::Cube => cube(),
            MeshKind::Plane => plane(),
            MeshKind::Icosahedron => icosahedron(),
            MeshKind::Cone => cone(CONE_SEGMENTS),
        }
    }
}

const CONE_SEGMENTS: u16 = 16;

fn v(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Vertex {
    Vertex { position, normal, uv }
}

/// Unit cube centred on the origin, one quad per face.
fn cube() -> Mesh {
    let p = 0.5_f32;
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[-p, -p, p], [p, -p, p], [p, p, p], [-p, p, p]]),
        ([0.0, 0.0, -1.0], [[p, -p, -p], [-p, -p, -p], [-p, p, -p], [p, p, -p]]),
        ([1.0, 0.0, 0.0], [[p, -p, p], [p, -p, -p], [p, p, -p], [p, p, p]]),
        ([-1.0, 0.0, 0.0], [[-p, -p, -p], [-p, -p, p], [-p, p, p], [-p, p, -p]]),
        ([0.0, 1.0, 0.0], [[-p, p, p], [p, p, p], [p, p, -p], [-p, p, -p]]),
        ([0.0, -1.0, 0.0], [[-p, -p, -p], [p, -p, -p], [p, -p, p], [-p, -p, p]]),
    ];
    let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = vertices.len() as u16;
        for (corner, uv) in corners.into_iter().zip(uvs) {
            vertices.push(v(corner, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    Mesh { vertices, indices }
}

/// Unit square in the XZ plane facing +Y.
fn plane() -> Mesh {
    let p = 0.5_f32;
    let up = [0.0, 1.0, 0.0];
    Mesh {
        vertices: vec![
            v([-p, 0.0, p], up, [0.0, 1.0]),
            v([p, 0.0, p], up, [1.0, 1.0]),
            v([p, 0.0, -p], up, [1.0, 0.0]),
            v([-p, 0.0, -p], up, [0.0, 0.0]),
        ],
        indices: vec![0, 1, 2, 2, 3, 0],
    }
}

/// Unit-radius icosahedron with flat per-face normals.
fn icosahedron() -> Mesh {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let corners = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
    .map(Vec3::normalize);
    #[rustfmt::skip]
    let faces: [[usize; 3]; 20] = [
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    let mut vertices = Vec::with_capacity(60);
    for [a, b, c] in faces {
        let (a, mut b, mut c) = (corners[a], corners[b], corners[c]);
        let mut normal = (b - a).cross(c - a).normalize();
        // Keep winding counter-clockwise as seen from outside.
        if normal.dot(a + b + c) < 0.0 {
            std::mem::swap(&mut b, &mut c);
            normal = -normal;
        }
        for p in [a, b, c] {
            let uv = [
                p.z.atan2(p.x) / std::f32::consts::TAU + 0.5,
                0.5 - p.y.asin() / std::f32::consts::PI,
            ];
            vertices.push(v(p.to_array(), normal.to_array(), uv));
        }
    }
    let indices = (0..vertices.len() as u16).collect();
    Mesh { vertices, indices }
}

/// Faceted cone: one flat side triangle per segment plus a base fan.
fn cone(segments: u16) -> Mesh {
    let apex = Vec3::new(0.0, 0.5, 0.0);
    let centre = Vec3::new(0.0, -0.5, 0.0);
    let rim = |i: u16| {
        let a = i as f32 / segments as f32 * std::f32::consts::TAU;
        Vec3::new(a.cos(), -0.5, -a.sin())
    };
    let planar = |p: Vec3| [p.x * 0.5 + 0.5, 0.5 - p.z * 0.5];

    let mut vertices = Vec::with_capacity(segments as usize * 6);
    for i in 0..segments {
        let (a, b) = (rim(i), rim(i + 1));
        let side = (a - apex).cross(b - apex).normalize();
        let u = |k: u16| k as f32 / segments as f32;
        vertices.push(v(apex.to_array(), side.to_array(), [(u(i) + u(i + 1)) / 2.0, 0.0]));
        vertices.push(v(a.to_array(), side.to_array(), [u(i), 1.0]));
        vertices.push(v(b.to_array(), side.to_array(), [u(i + 1), 1.0]));

        let down = [0.0, -1.0, 0.0];
        vertices.push(v(centre.to_array(), down, planar(centre)));
        vertices.push(v(b.to_array(), down, planar(b)));
        vertices.push(v(a.to_array(), down, planar(a)));
    }
    let indices = (0..vertices.len() as u16).collect();
    Mesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward_ccw(mesh: &Mesh) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let pa = Vec3::from(a.position);
            let face = (Vec3::from(b.position) - pa).cross(Vec3::from(c.position) - pa);
            assert!(face.dot(Vec3::from(a.normal)) > 0.0, "winding disagrees with normal");
        }
    }

    #[test]
    fn cube_has_six_quads() {
        let mesh = Mesh::for_kind(MeshKind::Cube);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_outward_ccw(&mesh);
    }

    #[test]
    fn plane_faces_up() {
        let mesh = Mesh::for_kind(MeshKind::Plane);
        assert!(mesh.vertices.iter().all(|v| v.position[1] == 0.0 && v.normal == [0.0, 1.0, 0.0]));
        assert_outward_ccw(&mesh);
    }

    #[test]
    fn icosahedron_is_unit_radius_and_closed() {
        let mesh = Mesh::for_kind(MeshKind::Icosahedron);
        assert_eq!(mesh.indices.len(), 60);
        for vertex in &mesh.vertices {
            assert!((Vec3::from(vertex.position).length() - 1.0).abs() < 1e-5);
            assert!((Vec3::from(vertex.normal).length() - 1.0).abs() < 1e-5);
        }
        assert_outward_ccw(&mesh);
    }

    #[test]
    fn cone_spans_unit_box_with_apex_up() {
        let mesh = Mesh::for_kind(MeshKind::Cone);
        assert_eq!(mesh.indices.len(), CONE_SEGMENTS as usize * 6);
        let top = mesh.vertices.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        let bottom = mesh.vertices.iter().map(|v| v.position[1]).fold(f32::MAX, f32::min);
        assert_eq!((top, bottom), (0.5, -0.5));
        for vertex in &mesh.vertices {
            let [x, _, z] = vertex.position;
            assert!((x * x + z * z).sqrt() <= 1.0 + 1e-5);
        }
        assert_outward_ccw(&mesh);
    }
}
