//! Loading of meshes, textures, cube maps and glTF scenes from disk.
//!
//! Every path is relative to the asset root handed to [`Assets::new`].
//! Loader failures are logged and turn into empty results so that a missing
//! file never takes the scene down with it.

use std::{
    collections::HashMap,
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Context;

use crate::{
    data_structures::{
        animation::Animation,
        material::Material,
        mesh::Mesh,
        renderer::MeshRenderer,
        scene_graph::{ObjectId, Scene, SceneObject},
        texture::Texture,
        transform::Transform,
    },
    math::Vec3,
    render::pipeline::MAIN_TEX,
    resources::{animation::mirror_rotation, mesh::mirror_z, texture::TextureCache},
};

pub mod animation;
pub mod mesh;
pub mod texture;

pub async fn load_string(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Could not read {:?}", path))
}

pub async fn load_binary(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Could not read {:?}", path))
}

/// Objects and animations of one imported glTF file.
///
/// Objects are in depth-first node order with their transforms already
/// parented; the animations drive those transforms.
#[derive(Debug, Default)]
pub struct GltfScene {
    pub objects: Vec<SceneObject>,
    pub animations: Vec<Rc<Animation>>,
}

impl GltfScene {
    /// Moves every object into `scene`.
    pub fn add_to(self, scene: &mut Scene) -> Vec<ObjectId> {
        self.objects
            .into_iter()
            .map(|object| scene.add_object(object))
            .collect()
    }

    pub fn animation(&self, name: &str) -> Option<Rc<Animation>> {
        self.animations.iter().find(|a| a.name == name).cloned()
    }
}

#[derive(Debug)]
pub struct Assets {
    root: PathBuf,
    textures: TextureCache,
}

impl Assets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            textures: TextureCache::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureCache {
        &mut self.textures
    }

    /// Reads `textures/<location>` once; later calls hand out the cached
    /// texture.
    pub async fn load_texture(&mut self, location: &str) -> Option<Rc<Texture>> {
        if let Some(texture) = self.textures.get(location) {
            return Some(texture);
        }
        let path = self.root.join("textures").join(location);
        match texture::load_image(&path).await {
            Ok(image) => Some(self.textures.insert(Texture::from_image(location, image))),
            Err(e) => {
                log::error!("Texture {} could not be loaded: {:?}", location, e);
                None
            }
        }
    }

    /// Reads the six faces `textures/<location>/<face><extension>`.
    pub async fn load_cubemap(&mut self, location: &str, extension: &str) -> Option<Rc<Texture>> {
        if let Some(texture) = self.textures.get(location) {
            return Some(texture);
        }
        let directory = self.root.join("textures").join(location);
        match texture::load_cubemap_faces(&directory, extension).await {
            Ok(faces) => Some(self.textures.insert(Texture::cubemap(location, faces))),
            Err(e) => {
                log::error!("Cube map {} could not be loaded: {:?}", location, e);
                None
            }
        }
    }

    /// Every mesh in the OBJ or glTF file at `location`.
    pub async fn load_meshes(&self, location: &str) -> Vec<Rc<Mesh>> {
        let path = self.root.join(location);
        let meshes = match extension(&path).as_deref() {
            Some("obj") => self.obj_meshes(&path, location).await,
            Some("gltf") | Some("glb") => self.gltf_file(&path).await.map(|(document, buffers)| {
                document
                    .meshes()
                    .flat_map(|m| mesh::gltf_meshes(&m, &buffers))
                    .collect()
            }),
            _ => Err(anyhow::anyhow!("unsupported model format")),
        };
        match meshes {
            Ok(meshes) => meshes.into_iter().map(Rc::new).collect(),
            Err(e) => {
                log::error!("Meshes of {} could not be loaded: {:?}", location, e);
                Vec::new()
            }
        }
    }

    async fn obj_meshes(&self, path: &Path, location: &str) -> anyhow::Result<Vec<Mesh>> {
        let text = load_string(path).await?;
        let mut reader = BufReader::new(Cursor::new(text));
        let (models, _) = tobj::load_obj_buf_async(
            &mut reader,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            // surface properties come from engine materials, not MTL files
            |_| async { Ok(Default::default()) },
        )
        .await?;
        Ok(mesh::obj_meshes(&models, location))
    }

    async fn gltf_file(&self, path: &Path) -> anyhow::Result<(gltf::Document, Vec<Vec<u8>>)> {
        let bytes = load_binary(path).await?;
        let gltf = gltf::Gltf::from_slice(&bytes)?;
        let directory = path.parent().unwrap_or(&self.root).to_path_buf();

        let mut buffers = Vec::new();
        for buffer in gltf.buffers() {
            let data = match buffer.source() {
                gltf::buffer::Source::Bin => gltf
                    .blob
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("binary chunk missing"))?,
                gltf::buffer::Source::Uri(uri) => load_binary(&directory.join(uri)).await?,
            };
            buffers.push(data);
        }
        Ok((gltf.document, buffers))
    }

    /// Imports the default scene of a glTF file.
    ///
    /// Every node becomes a scene object and every triangle primitive a
    /// renderer on its node's object, drawn with `material`. Base color
    /// textures are bound as `_MainTex`.
    pub async fn load_gltf(&mut self, location: &str, material: &Rc<Material>) -> Option<GltfScene> {
        let path = self.root.join(location);
        let (document, buffers) = match self.gltf_file(&path).await {
            Ok(file) => file,
            Err(e) => {
                log::error!("glTF {} could not be loaded: {:?}", location, e);
                return None;
            }
        };
        let directory = path.parent().unwrap_or(&self.root).to_path_buf();

        let mut base_colors = HashMap::new();
        for gltf_material in document.materials() {
            let (Some(index), Some(info)) = (
                gltf_material.index(),
                gltf_material.pbr_metallic_roughness().base_color_texture(),
            ) else {
                continue;
            };
            let image = info.texture().source();
            if let Some(texture) = self.gltf_image(&image, &buffers, &directory, location).await {
                base_colors.insert(index, texture);
            }
        }

        let Some(scene) = document
            .default_scene()
            .or_else(|| document.scenes().next())
        else {
            log::warn!("{} contains no scene", location);
            return Some(GltfScene::default());
        };

        let mut import = GltfImport {
            buffers: &buffers,
            material,
            base_colors: &base_colors,
            meshes: HashMap::new(),
            transforms: HashMap::new(),
            objects: Vec::new(),
        };
        for node in scene.nodes() {
            import.visit(&node, None);
        }
        let animations = animation::gltf_animations(&document, &buffers, &import.transforms);
        log::info!(
            "Imported {} objects and {} animations from {}",
            import.objects.len(),
            animations.len(),
            location
        );
        Some(GltfScene {
            objects: import.objects,
            animations,
        })
    }

    async fn gltf_image(
        &mut self,
        image: &gltf::Image<'_>,
        buffers: &[Vec<u8>],
        directory: &Path,
        location: &str,
    ) -> Option<Rc<Texture>> {
        let key = format!("{}#{}", location, image.index());
        if let Some(texture) = self.textures.get(&key) {
            return Some(texture);
        }
        let decoded = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let bytes = buffers
                    .get(view.buffer().index())
                    .and_then(|data| data.get(view.offset()..view.offset() + view.length()));
                match bytes {
                    Some(bytes) => texture::decode_image(bytes, mime_type.split('/').next_back()),
                    None => Err(anyhow::anyhow!("buffer view out of range")),
                }
            }
            gltf::image::Source::Uri { uri, .. } => texture::load_image(&directory.join(uri)).await,
        };
        match decoded {
            Ok(image) => Some(self.textures.insert(Texture::from_image(&key, image))),
            Err(e) => {
                log::warn!("Image {} could not be decoded: {:?}", key, e);
                None
            }
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

struct GltfImport<'a> {
    buffers: &'a [Vec<u8>],
    material: &'a Rc<Material>,
    base_colors: &'a HashMap<usize, Rc<Texture>>,
    // shared between nodes that instance the same mesh
    meshes: HashMap<usize, Vec<(Rc<Mesh>, Option<usize>)>>,
    transforms: HashMap<usize, Transform>,
    objects: Vec<SceneObject>,
}

impl GltfImport<'_> {
    fn visit(&mut self, node: &gltf::Node<'_>, parent: Option<&Transform>) {
        let (translation, rotation, scale) = node.transform().decomposed();
        let transform = Transform::from_trs(
            Vec3::from(mirror_z(translation)),
            mirror_rotation(rotation),
            Vec3::from(scale),
        );
        if let Some(parent) = parent {
            if let Err(e) = transform.set_parent(Some(parent)) {
                log::error!("Could not parent glTF node {}: {}", node.index(), e);
            }
        }
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Node{}", node.index()));
        let mut object = SceneObject::with_transform(&name, transform.clone());

        if let Some(gltf_mesh) = node.mesh() {
            for (mesh, material_index) in self.primitives(&gltf_mesh) {
                let mut renderer = MeshRenderer::new(mesh, self.material.clone());
                if let Some(texture) = material_index.and_then(|i| self.base_colors.get(&i)) {
                    renderer.properties.set_texture(MAIN_TEX, texture.clone());
                }
                object.add_component(renderer);
            }
        }
        self.transforms.insert(node.index(), transform.clone());
        self.objects.push(object);

        for child in node.children() {
            self.visit(&child, Some(&transform));
        }
    }

    fn primitives(&mut self, gltf_mesh: &gltf::Mesh<'_>) -> Vec<(Rc<Mesh>, Option<usize>)> {
        let buffers = self.buffers;
        self.meshes
            .entry(gltf_mesh.index())
            .or_insert_with(|| {
                let name = gltf_mesh.name().unwrap_or("Mesh");
                gltf_mesh
                    .primitives()
                    .filter_map(|primitive| {
                        let mesh = mesh::gltf_primitive(&primitive, name, buffers)?;
                        Some((Rc::new(mesh), primitive.material().index()))
                    })
                    .collect()
            })
            .clone()
    }
}
