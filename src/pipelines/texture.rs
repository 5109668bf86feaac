//! GPU textures and texture creation utilities.
//!
//! This module provides [`GpuTexture`], a wrapper around a wgpu texture with
//! its view and sampler, and helpers for depth and colour targets and for
//! uploading [`Texture`] descriptions with their mip chains.

use anyhow::*;
use image::{RgbaImage, imageops::FilterType};

use crate::data_structures::texture::{FilterMode, Texture, TextureData, WrapMode};

/// How a texture is viewed in shaders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
    Depth,
}

/// A GPU texture with a view and the sampler it is bound with.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub kind: TextureKind,
}

impl GpuTexture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// The texture can also be sampled, e.g. by a post process pass, through
    /// a non-filtering sampler.
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            kind: TextureKind::Depth,
        }
    }

    /// A colour attachment that can be sampled and read back afterwards.
    pub fn create_color_target(
        device: &wgpu::Device,
        size: [u32; 2],
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size[0].max(1),
                height: size[1].max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
            kind: TextureKind::D2,
        }
    }

    /// Uploads `source` with every mip level of its chain.
    ///
    /// Mip levels are downsampled on the CPU. `ClampToBorder` needs
    /// `Features::ADDRESS_MODE_CLAMP_TO_BORDER` and falls back to
    /// `ClampToEdge` without it.
    pub fn from_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &Texture,
    ) -> Result<Self> {
        let faces: Vec<&RgbaImage> = match source.data() {
            TextureData::Image(image) => vec![image],
            TextureData::Cubemap(faces) => faces.iter().collect(),
        };
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            bail!("{} has no pixels", source.location());
        }
        if faces.iter().any(|face| face.dimensions() != (width, height)) {
            bail!("the faces of cube map {} differ in size", source.location());
        }
        if source.is_cubemap() && width != height {
            bail!("cube map {} has non-square faces", source.location());
        }

        let mip_level_count = source.mip_level_count();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: faces.len() as u32,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(source.location()),
            size,
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, face) in faces.iter().enumerate() {
            for level in 0..mip_level_count {
                let level_width = (width >> level).max(1);
                let level_height = (height >> level).max(1);
                let resized;
                let pixels: &RgbaImage = match level {
                    0 => *face,
                    _ => {
                        resized = image::imageops::resize(
                            *face,
                            level_width,
                            level_height,
                            FilterType::Triangle,
                        );
                        &resized
                    }
                };
                queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        aspect: wgpu::TextureAspect::All,
                        texture: &texture,
                        mip_level: level,
                        origin: wgpu::Origin3d {
                            x: 0,
                            y: 0,
                            z: layer as u32,
                        },
                    },
                    pixels,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(4 * level_width),
                        rows_per_image: Some(level_height),
                    },
                    wgpu::Extent3d {
                        width: level_width,
                        height: level_height,
                        depth_or_array_layers: 1,
                    },
                );
            }
        }

        let (kind, dimension) = match source.is_cubemap() {
            true => (TextureKind::Cube, Some(wgpu::TextureViewDimension::Cube)),
            false => (TextureKind::D2, None),
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension,
            ..Default::default()
        });

        let border = device
            .features()
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        if source.wrap == WrapMode::ClampToBorder && !border {
            log::warn!(
                "{} wants ClampToBorder which this device lacks, using ClampToEdge",
                source.location()
            );
        }
        let address_mode = address_mode(source.wrap, border);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(source.location()),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter_mode(source.mag_filter),
            min_filter: filter_mode(source.min_filter),
            mipmap_filter: filter_mode(source.mipmap_filter),
            border_color: (address_mode == wgpu::AddressMode::ClampToBorder)
                .then_some(wgpu::SamplerBorderColor::TransparentBlack),
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            kind,
        })
    }

    /// An opaque white stand-in for unbound texture slots.
    pub fn fallback(device: &wgpu::Device, queue: &wgpu::Queue, kind: TextureKind) -> Self {
        match kind {
            TextureKind::Depth => Self::create_depth_texture(device, [1, 1], "fallback depth"),
            TextureKind::D2 | TextureKind::Cube => {
                let white = || RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
                let source = match kind {
                    TextureKind::Cube => Texture::cubemap(
                        "fallback cube",
                        [white(), white(), white(), white(), white(), white()],
                    ),
                    _ => Texture::from_image("fallback 2d", white()),
                }
                .with_mipmaps(false, FilterMode::Point);
                let (texture, view) = upload_single(device, queue, &source);
                let sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());
                Self {
                    texture,
                    view,
                    sampler,
                    kind,
                }
            }
        }
    }
}

fn upload_single(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &Texture,
) -> (wgpu::Texture, wgpu::TextureView) {
    let layers: Vec<&RgbaImage> = match source.data() {
        TextureData::Image(image) => vec![image],
        TextureData::Cubemap(faces) => faces.iter().collect(),
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(source.location()),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: layers.len() as u32,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: GpuTexture::COLOR_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (layer, pixels) in layers.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer as u32,
                },
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }
    let dimension = source
        .is_cubemap()
        .then_some(wgpu::TextureViewDimension::Cube);
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        dimension,
        ..Default::default()
    });
    (texture, view)
}

pub fn address_mode(wrap: WrapMode, clamp_to_border: bool) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::ClampToBorder if clamp_to_border => wgpu::AddressMode::ClampToBorder,
        WrapMode::ClampToBorder => wgpu::AddressMode::ClampToEdge,
    }
}

pub fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Point => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}
