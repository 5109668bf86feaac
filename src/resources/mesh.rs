//! Conversion of decoded model files into [`Mesh`]es.
//!
//! OBJ and glTF are right-handed with counter-clockwise front faces. Both are
//! brought into the engine's left-handed space by mirroring Z, which also
//! requires reversing every triangle.

use crate::data_structures::mesh::Mesh;

pub(crate) fn mirror_z(v: [f32; 3]) -> [f32; 3] {
    [v[0], v[1], -v[2]]
}

pub(crate) fn reverse_winding(indices: Vec<u32>) -> Vec<u32> {
    indices
        .chunks_exact(3)
        .flat_map(|c| [c[0], c[2], c[1]])
        .collect()
}

/**
 * Obj files don't come with tangents so they are generated from the UVs for
 * normal maps to work. The V axis is flipped to match the wgpu texture
 * coordinate system.
 */
pub fn obj_meshes(models: &[tobj::Model], file_name: &str) -> Vec<Mesh> {
    models
        .iter()
        .filter_map(|m| {
            let vertex_count = m.mesh.positions.len() / 3;
            if vertex_count == 0 || m.mesh.indices.len() < 3 {
                log::warn!("{} in {} has no triangles", m.name, file_name);
                return None;
            }
            let positions = (0..vertex_count)
                .map(|i| {
                    mirror_z([
                        m.mesh.positions[i * 3],
                        m.mesh.positions[i * 3 + 1],
                        m.mesh.positions[i * 3 + 2],
                    ])
                })
                .collect();
            let mut mesh = Mesh::new(&m.name, positions, reverse_winding(m.mesh.indices.clone()));
            if m.mesh.normals.len() == vertex_count * 3 {
                mesh = mesh.with_normals(
                    (0..vertex_count)
                        .map(|i| {
                            mirror_z([
                                m.mesh.normals[i * 3],
                                m.mesh.normals[i * 3 + 1],
                                m.mesh.normals[i * 3 + 2],
                            ])
                        })
                        .collect(),
                );
            }
            if m.mesh.texcoords.len() == vertex_count * 2 {
                mesh = mesh.with_uvs(
                    (0..vertex_count)
                        .map(|i| [m.mesh.texcoords[i * 2], 1.0 - m.mesh.texcoords[i * 2 + 1]])
                        .collect(),
                );
            }
            Some(mesh.with_generated_tangents())
        })
        .collect()
}

/// One mesh per triangle primitive of `mesh`.
pub fn gltf_meshes(mesh: &gltf::Mesh<'_>, buffers: &[Vec<u8>]) -> Vec<Mesh> {
    let name = mesh.name().unwrap_or("Mesh");
    mesh.primitives()
        .filter_map(|primitive| gltf_primitive(&primitive, name, buffers))
        .collect()
}

/// `None` for non-triangle primitives and primitives without geometry.
pub fn gltf_primitive(
    primitive: &gltf::Primitive<'_>,
    name: &str,
    buffers: &[Vec<u8>],
) -> Option<Mesh> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("{}: only triangle primitives are imported", name);
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.map(mirror_z).collect();
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if positions.is_empty() || indices.len() < 3 {
        return None;
    }
    let vertex_count = positions.len();
    let mut out = Mesh::new(name, positions, reverse_winding(indices));
    if let Some(normals) = reader.read_normals() {
        out = out.with_normals(normals.map(mirror_z).collect());
    }
    let mut channel = 0;
    while let Some(uvs) = reader.read_tex_coords(channel) {
        out = out.with_uvs(uvs.into_f32().collect());
        channel += 1;
    }
    match reader.read_tangents() {
        // glTF tangents are vec4 where the 4th component is the bitangent sign
        Some(tangents) => {
            let tangents: Vec<[f32; 3]> = tangents.map(|t| mirror_z([t[0], t[1], t[2]])).collect();
            if tangents.len() == vertex_count {
                out = out.with_tangents(tangents);
            } else {
                out = out.with_generated_tangents();
            }
        }
        None => out = out.with_generated_tangents(),
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winding_is_reversed_per_triangle() {
        assert_eq!(reverse_winding(vec![0, 1, 2, 3, 4, 5]), vec![0, 2, 1, 3, 5, 4]);
    }

    #[test]
    fn obj_import_flips_v_and_z() {
        let model = tobj::Model::new(
            tobj::Mesh {
                positions: vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0],
                texcoords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
                indices: vec![0, 1, 2],
                ..Default::default()
            },
            "tri".to_string(),
        );
        let meshes = obj_meshes(&[model], "tri.obj");
        assert_eq!(meshes.len(), 1);
        let mesh = &meshes[0];
        assert_eq!(mesh.positions()[0], [0.0, 0.0, -1.0]);
        assert_eq!(mesh.uvs(0).unwrap()[0], [0.0, 1.0]);
        assert_eq!(mesh.indices(), &[0, 2, 1]);
        assert_eq!(mesh.tangents().len(), 3);
    }
}
