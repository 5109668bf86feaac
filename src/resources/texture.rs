use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Context;
use image::RgbaImage;

use crate::{
    data_structures::texture::{CUBEMAP_FACES, Texture},
    resources::load_binary,
};

/// Loaded textures by location. A location is read and decoded once and the
/// same `Rc` is handed out afterwards.
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: HashMap<String, Rc<Texture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &str) -> Option<Rc<Texture>> {
        self.textures.get(location).cloned()
    }

    /// Caches `texture` unless its location is already taken; returns the
    /// cached texture either way.
    pub fn insert(&mut self, texture: Texture) -> Rc<Texture> {
        self.textures
            .entry(texture.location().to_string())
            .or_insert_with(|| Rc::new(texture))
            .clone()
    }

    pub fn contains(&self, location: &str) -> bool {
        self.textures.contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}

pub fn decode_image(bytes: &[u8], format: Option<&str>) -> anyhow::Result<RgbaImage> {
    let image = match format.and_then(image::ImageFormat::from_extension) {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(image.to_rgba8())
}

pub async fn load_image(path: &Path) -> anyhow::Result<RgbaImage> {
    let data = load_binary(path).await?;
    let extension = path.extension().and_then(|ext| ext.to_str());
    decode_image(&data, extension).with_context(|| format!("{:?} is not a readable image", path))
}

/// The six face paths of the cube map in `directory`, in upload order.
pub fn cubemap_paths(directory: &Path, extension: &str) -> [PathBuf; 6] {
    CUBEMAP_FACES.map(|face| directory.join(format!("{}{}", face, extension)))
}

pub async fn load_cubemap_faces(directory: &Path, extension: &str) -> anyhow::Result<[RgbaImage; 6]> {
    let paths = cubemap_paths(directory, extension);
    let faces = futures::future::try_join_all(paths.iter().map(|path| load_image(path))).await?;
    faces
        .try_into()
        .map_err(|_| anyhow::anyhow!("a cube map needs six faces"))
}
