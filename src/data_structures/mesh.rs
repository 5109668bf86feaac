//! Immutable geometry payloads.
//!
//! Triangles are wound so that `cross(b - a, c - a)` points along the
//! surface normal. Meshes are never edited in place once shared: the
//! transform and combine helpers return new meshes with fresh ids.

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::{InnerSpace, Matrix, Matrix3, SquareMatrix};

use crate::math::{Mat4, Vec2, Vec3};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

const DEFAULT_TANGENT: [f32; 3] = [1.0, 0.0, 0.0];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct Mesh {
    id: MeshId,
    name: String,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    tangents: Vec<[f32; 3]>,
    uv_channels: Vec<Vec<[f32; 2]>>,
    indices: Vec<u32>,
}

impl Mesh {
    pub fn new(name: &str, positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            id: MeshId::next(),
            name: name.to_string(),
            positions,
            normals: Vec::new(),
            tangents: Vec::new(),
            uv_channels: Vec::new(),
            indices,
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_tangents(mut self, tangents: Vec<[f32; 3]>) -> Self {
        self.tangents = tangents;
        self
    }

    /// Appends a UV channel. The first call sets channel 0.
    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uv_channels.push(uvs);
        self
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn tangents(&self) -> &[[f32; 3]] {
        &self.tangents
    }

    pub fn uv_channels(&self) -> &[Vec<[f32; 2]>] {
        &self.uv_channels
    }

    pub fn uvs(&self, channel: usize) -> Option<&[[f32; 2]]> {
        self.uv_channels.get(channel).map(Vec::as_slice)
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// A flat grid on the XZ plane centred at the origin, facing `+Y`.
    ///
    /// `subdivisions` is the number of cells along each side (at least one).
    pub fn plane(size: f32, subdivisions: u32) -> Self {
        let cells = subdivisions.max(1);
        let side = cells + 1;
        let step = size / cells as f32;
        let half = size * 0.5;

        let mut positions = Vec::with_capacity((side * side) as usize);
        let mut uvs = Vec::with_capacity((side * side) as usize);
        for j in 0..side {
            for i in 0..side {
                positions.push([i as f32 * step - half, 0.0, j as f32 * step - half]);
                uvs.push([i as f32 / cells as f32, j as f32 / cells as f32]);
            }
        }

        let index = |i: u32, j: u32| j * side + i;
        let mut indices = Vec::with_capacity((cells * cells * 6) as usize);
        for j in 0..cells {
            for i in 0..cells {
                indices.extend_from_slice(&[
                    index(i, j),
                    index(i, j + 1),
                    index(i + 1, j),
                    index(i + 1, j),
                    index(i, j + 1),
                    index(i + 1, j + 1),
                ]);
            }
        }

        let count = positions.len();
        Mesh::new("Plane", positions, indices)
            .with_normals(vec![[0.0, 1.0, 0.0]; count])
            .with_tangents(vec![DEFAULT_TANGENT; count])
            .with_uvs(uvs)
    }

    /// A quad on the XY plane facing `-Z`, shifted by `offset`.
    pub fn quad(size: f32, offset: Vec3) -> Self {
        let h = size * 0.5;
        let corner = |x: f32, y: f32| [x + offset.x, y + offset.y, offset.z];
        let positions = vec![corner(-h, -h), corner(-h, h), corner(h, -h), corner(h, h)];
        Mesh::new("Quad", positions, vec![0, 1, 2, 2, 1, 3])
            .with_normals(vec![[0.0, 0.0, -1.0]; 4])
            .with_tangents(vec![DEFAULT_TANGENT; 4])
            .with_uvs(vec![[0.0, 1.0], [0.0, 0.0], [1.0, 1.0], [1.0, 0.0]])
    }

    /// A cube spanning `[-1, 1]` on every axis, used for sky boxes.
    pub fn cube() -> Self {
        let positions = vec![
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // back
            4, 5, 6, 4, 6, 7, // front
            0, 4, 7, 0, 7, 3, // left
            1, 2, 6, 1, 6, 5, // right
            3, 7, 6, 3, 6, 2, // top
            0, 1, 5, 0, 5, 4, // bottom
        ];
        let normals = positions
            .iter()
            .map(|p: &[f32; 3]| Vec3::from(*p).normalize().into())
            .collect();
        Mesh::new("Cube", positions, indices).with_normals(normals)
    }

    /// Applies `matrix` to positions, normals and tangents.
    pub fn transformed(&self, matrix: &Mat4) -> Mesh {
        let linear = Matrix3::from_cols(matrix.x.truncate(), matrix.y.truncate(), matrix.z.truncate());
        let normal_matrix = linear.invert().map(|m| m.transpose()).unwrap_or(linear);

        let positions = self
            .positions
            .iter()
            .map(|p| (*matrix * Vec3::from(*p).extend(1.0)).truncate().into())
            .collect();
        let normals = self
            .normals
            .iter()
            .map(|n| normalize_or(normal_matrix * Vec3::from(*n), [0.0, 1.0, 0.0]))
            .collect();
        let tangents = self
            .tangents
            .iter()
            .map(|t| normalize_or(linear * Vec3::from(*t), DEFAULT_TANGENT))
            .collect();

        Mesh {
            id: MeshId::next(),
            name: self.name.clone(),
            positions,
            normals,
            tangents,
            uv_channels: self.uv_channels.clone(),
            indices: self.indices.clone(),
        }
    }

    /// Concatenates two meshes.
    ///
    /// Attributes missing on either side are dropped; only the UV channels
    /// both meshes have survive.
    pub fn combine(&self, other: &Mesh) -> Mesh {
        let offset = self.positions.len() as u32;
        let concat = |a: &Vec<[f32; 3]>, a_len: usize, b: &Vec<[f32; 3]>, b_len: usize| -> Vec<[f32; 3]> {
            if a.len() == a_len && b.len() == b_len {
                a.iter().chain(b.iter()).copied().collect()
            } else {
                Vec::new()
            }
        };
        let (a_len, b_len) = (self.positions.len(), other.positions.len());
        let channels = self.uv_channels.len().min(other.uv_channels.len());
        let uv_channels = (0..channels)
            .map(|c| {
                self.uv_channels[c]
                    .iter()
                    .chain(other.uv_channels[c].iter())
                    .copied()
                    .collect()
            })
            .collect();

        Mesh {
            id: MeshId::next(),
            name: format!("{}+{}", self.name, other.name),
            positions: concat(&self.positions, a_len, &other.positions, b_len),
            normals: concat(&self.normals, a_len, &other.normals, b_len),
            tangents: concat(&self.tangents, a_len, &other.tangents, b_len),
            uv_channels,
            indices: self
                .indices
                .iter()
                .copied()
                .chain(other.indices.iter().map(|i| i + offset))
                .collect(),
        }
    }

    /**
     * Per-vertex tangents from UV channel 0.
     *
     * Each triangle solves `delta_pos = delta_uv.x * T + delta_uv.y * B` and the
     * result is averaged over the triangles sharing a vertex. Triangles with a
     * degenerate UV mapping contribute nothing and vertices without any usable
     * triangle get the default tangent `(1, 0, 0)`.
     */
    pub fn with_generated_tangents(mut self) -> Self {
        let count = self.positions.len();
        let Some(uvs) = self.uv_channels.first().filter(|uvs| uvs.len() == count) else {
            self.tangents = vec![DEFAULT_TANGENT; count];
            return self;
        };

        let mut accumulated = vec![Vec3::new(0.0, 0.0, 0.0); count];
        for c in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
            if i0 >= count || i1 >= count || i2 >= count {
                continue;
            }
            let pos0 = Vec3::from(self.positions[i0]);
            let pos1 = Vec3::from(self.positions[i1]);
            let pos2 = Vec3::from(self.positions[i2]);
            let uv0 = Vec2::from(uvs[i0]);
            let uv1 = Vec2::from(uvs[i1]);
            let uv2 = Vec2::from(uvs[i2]);

            let delta_pos1 = pos1 - pos0;
            let delta_pos2 = pos2 - pos0;
            let delta_uv1 = uv1 - uv0;
            let delta_uv2 = uv2 - uv0;

            let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) / det;
            if !(tangent.x.is_finite() && tangent.y.is_finite() && tangent.z.is_finite()) {
                continue;
            }
            accumulated[i0] += tangent;
            accumulated[i1] += tangent;
            accumulated[i2] += tangent;
        }

        self.tangents = accumulated
            .into_iter()
            .map(|t| normalize_or(t, DEFAULT_TANGENT))
            .collect();
        self
    }
}

fn normalize_or(v: Vec3, fallback: [f32; 3]) -> [f32; 3] {
    let len = v.magnitude();
    if len > f32::EPSILON && len.is_finite() {
        (v / len).into()
    } else {
        fallback
    }
}
