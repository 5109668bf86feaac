use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use image::{Rgba, RgbaImage};
use reef_ngin::{
    data_structures::{
        material::Material,
        scene_graph::Scene,
        texture::CUBEMAP_FACES,
    },
    math::Vec3,
    resources::Assets,
};

/// A fresh asset root for one test.
fn asset_root(test: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("reef-ngin-{}-{}", test, std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(root.join("textures")).unwrap();
    root
}

fn write_png(path: &Path, color: [u8; 4]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(2, 2, Rgba(color)).save(path).unwrap();
}

const TRIANGLE_OBJ: &str = "\
o Tri
v 0 0 1
v 1 0 1
v 0 1 1
vt 0 0
vt 1 0
vt 0 1
f 1/1 2/2 3/3
";

/// One triangle on a child node and a translation animation on it.
const TRIANGLE_GLTF: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0] }],
    "nodes": [
        { "name": "Root", "translation": [0, 0, 2], "children": [1] },
        { "name": "Leaf", "mesh": 0 }
    ],
    "meshes": [{ "name": "Tri", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
    "animations": [{
        "name": "Bob",
        "samplers": [{ "input": 2, "output": 3, "interpolation": "LINEAR" }],
        "channels": [{ "sampler": 0, "target": { "node": 1, "path": "translation" } }]
    }],
    "buffers": [{ "uri": "tri.bin", "byteLength": 76 }],
    "bufferViews": [
        { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
        { "buffer": 0, "byteOffset": 36, "byteLength": 6 },
        { "buffer": 0, "byteOffset": 44, "byteLength": 8 },
        { "buffer": 0, "byteOffset": 52, "byteLength": 24 }
    ],
    "accessors": [
        { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0] },
        { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
        { "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0], "max": [1] },
        { "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }
    ]
}"#;

fn triangle_bin() -> Vec<u8> {
    let mut bytes = Vec::new();
    let floats = |bytes: &mut Vec<u8>, values: &[f32]| {
        values.iter().for_each(|v| bytes.extend_from_slice(&v.to_le_bytes()))
    };
    floats(&mut bytes, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    for index in [0u16, 1, 2, 0] {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    floats(&mut bytes, &[0.0, 1.0]);
    floats(&mut bytes, &[0.0, 0.0, 0.0, 0.0, 1.0, 3.0]);
    assert_eq!(bytes.len(), 76);
    bytes
}

#[tokio::test]
async fn textures_are_loaded_once() {
    let root = asset_root("textures");
    write_png(&root.join("textures/bricks.png"), [200, 100, 50, 255]);
    let mut assets = Assets::new(&root);

    let first = assets.load_texture("bricks.png").await.unwrap();
    let again = assets.load_texture("bricks.png").await.unwrap();
    assert!(Rc::ptr_eq(&first, &again));
    assert_eq!(first.dimensions(), (2, 2));
    assert_eq!(first.location(), "bricks.png");
    assert_eq!(assets.textures().len(), 1);
}

#[tokio::test]
async fn missing_texture_is_none() {
    let root = asset_root("missing-texture");
    let mut assets = Assets::new(&root);
    assert!(assets.load_texture("nowhere.png").await.is_none());
    assert!(assets.textures().is_empty());
}

#[tokio::test]
async fn cubemap_reads_all_six_faces() {
    let root = asset_root("cubemap");
    for face in CUBEMAP_FACES {
        write_png(&root.join("textures/sky").join(format!("{}.png", face)), [0, 0, 255, 255]);
    }
    let mut assets = Assets::new(&root);

    let sky = assets.load_cubemap("sky", ".png").await.unwrap();
    assert!(sky.is_cubemap());
    assert_eq!(sky.dimensions(), (2, 2));
}

#[tokio::test]
async fn cubemap_with_a_missing_face_is_none() {
    let root = asset_root("cubemap-missing");
    for face in &CUBEMAP_FACES[1..] {
        write_png(&root.join("textures/sky").join(format!("{}.png", face)), [0, 0, 255, 255]);
    }
    let mut assets = Assets::new(&root);
    assert!(assets.load_cubemap("sky", ".png").await.is_none());
}

#[tokio::test]
async fn obj_meshes_are_mirrored_into_left_handed_space() {
    let root = asset_root("obj");
    std::fs::write(root.join("tri.obj"), TRIANGLE_OBJ).unwrap();
    let assets = Assets::new(&root);

    let meshes = assets.load_meshes("tri.obj").await;
    assert_eq!(meshes.len(), 1);
    let mesh = &meshes[0];
    assert_eq!(mesh.name(), "Tri");
    assert_eq!(mesh.positions()[1], [1.0, 0.0, -1.0]);
    assert_eq!(mesh.indices(), &[0, 2, 1]);
    assert_eq!(mesh.uvs(0).unwrap()[2], [0.0, 0.0]);
    assert_eq!(mesh.tangents().len(), 3);
}

#[tokio::test]
async fn unsupported_or_missing_models_are_empty() {
    let root = asset_root("unsupported");
    std::fs::write(root.join("model.fbx"), "not a model").unwrap();
    let assets = Assets::new(&root);
    assert!(assets.load_meshes("model.fbx").await.is_empty());
    assert!(assets.load_meshes("missing.obj").await.is_empty());
}

#[tokio::test]
async fn gltf_nodes_become_parented_objects() {
    let root = asset_root("gltf");
    std::fs::write(root.join("tri.gltf"), TRIANGLE_GLTF).unwrap();
    std::fs::write(root.join("tri.bin"), triangle_bin()).unwrap();
    let mut assets = Assets::new(&root);
    let material = Rc::new(Material::new("Imported", "standard", "standard"));

    let imported = assets.load_gltf("tri.gltf", &material).await.unwrap();
    let names: Vec<&str> = imported.objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["Root", "Leaf"]);

    let (parent, leaf) = (&imported.objects[0], &imported.objects[1]);
    assert_eq!(parent.transform().position(), Vec3::new(0.0, 0.0, -2.0));
    assert!(leaf.transform().parent().unwrap().ptr_eq(parent.transform()));
    let renderer = leaf.renderer().unwrap();
    assert_eq!(renderer.mesh.name(), "Tri");
    assert_eq!(renderer.mesh.indices(), &[0, 2, 1]);
    assert_eq!(renderer.material.name, "Imported");
    assert!(parent.renderer().is_none());

    let bob = imported.animation("Bob").unwrap();
    assert_eq!(bob.duration(), 1.0);
    bob.evaluate(1.0);
    assert_eq!(leaf.transform().position(), Vec3::new(0.0, 1.0, -3.0));
    assert_eq!(leaf.transform().world_position(), Vec3::new(0.0, 1.0, -5.0));

    let mut scene = Scene::new();
    let ids = imported.add_to(&mut scene);
    assert_eq!(ids.len(), 2);
    assert_eq!(scene.renderers().count(), 1);
}

#[tokio::test]
async fn gltf_meshes_load_without_a_scene() {
    let root = asset_root("gltf-meshes");
    std::fs::write(root.join("tri.gltf"), TRIANGLE_GLTF).unwrap();
    std::fs::write(root.join("tri.bin"), triangle_bin()).unwrap();
    let assets = Assets::new(&root);

    let meshes = assets.load_meshes("tri.gltf").await;
    assert_eq!(meshes.len(), 1);
    assert_eq!(meshes[0].vertex_count(), 3);
}

#[tokio::test]
async fn broken_gltf_is_none() {
    let root = asset_root("gltf-broken");
    std::fs::write(root.join("bad.gltf"), "{ not json").unwrap();
    let mut assets = Assets::new(&root);
    let material = Rc::new(Material::new("Imported", "standard", "standard"));
    assert!(assets.load_gltf("bad.gltf", &material).await.is_none());
}
