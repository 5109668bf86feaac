//! CPU-side texture descriptions.
//!
//! A [`Texture`] is identified by its source location. Two textures with the
//! same location are the same texture as far as baking and caching go.

use image::{Rgba, RgbaImage};

/// Cube map faces in upload order.
pub const CUBEMAP_FACES: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToBorder,
    ClampToEdge,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Point,
    #[default]
    Linear,
}

#[derive(Clone, Debug)]
pub enum TextureData {
    Image(RgbaImage),
    Cubemap(Box<[RgbaImage; 6]>),
}

#[derive(Clone, Debug)]
pub struct Texture {
    location: String,
    data: TextureData,
    pub wrap: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub use_mipmaps: bool,
}

impl Texture {
    pub fn from_image(location: &str, image: RgbaImage) -> Self {
        Self::with_data(location, TextureData::Image(image))
    }

    /// Faces are ordered as in [`CUBEMAP_FACES`].
    pub fn cubemap(location: &str, faces: [RgbaImage; 6]) -> Self {
        let mut texture = Self::with_data(location, TextureData::Cubemap(Box::new(faces)));
        texture.wrap = WrapMode::ClampToEdge;
        texture
    }

    /// A 1x1 texture of a single colour.
    pub fn solid(location: &str, rgba: [u8; 4]) -> Self {
        Self::from_image(location, RgbaImage::from_pixel(1, 1, Rgba(rgba)))
    }

    fn with_data(location: &str, data: TextureData) -> Self {
        Self {
            location: location.to_string(),
            data,
            wrap: WrapMode::default(),
            mag_filter: FilterMode::default(),
            min_filter: FilterMode::default(),
            mipmap_filter: FilterMode::default(),
            use_mipmaps: true,
        }
    }

    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn with_filters(mut self, min: FilterMode, mag: FilterMode) -> Self {
        self.min_filter = min;
        self.mag_filter = mag;
        self
    }

    pub fn with_mipmaps(mut self, use_mipmaps: bool, filter: FilterMode) -> Self {
        self.use_mipmaps = use_mipmaps;
        self.mipmap_filter = filter;
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn data(&self) -> &TextureData {
        &self.data
    }

    pub fn is_cubemap(&self) -> bool {
        matches!(self.data, TextureData::Cubemap(_))
    }

    /// Size of the image, or of one face for cube maps.
    pub fn dimensions(&self) -> (u32, u32) {
        match &self.data {
            TextureData::Image(image) => image.dimensions(),
            TextureData::Cubemap(faces) => faces[0].dimensions(),
        }
    }

    /// Number of mip levels a full chain for this texture has.
    pub fn mip_level_count(&self) -> u32 {
        if !self.use_mipmaps {
            return 1;
        }
        let (width, height) = self.dimensions();
        32 - width.max(height).max(1).leading_zeros()
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
    }
}

impl Eq for Texture {}
