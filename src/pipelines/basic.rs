//! Vertex layout and render pipeline construction for the wgpu backend.

use crate::{
    data_structures::mesh::Mesh,
    pipelines::texture::GpuTexture,
    render::backend::{DepthFunc, ProgramHandle},
};

/// Interleaved vertex fed to every program.
///
/// Shader locations: 0 position, 1 normal, 2 tangent, 3 first UV channel.
/// Programs may consume any subset of them.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StandardVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
}

impl StandardVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<StandardVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 9]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }

    /// Interleaves a mesh. Missing channels are zero filled.
    pub fn interleave(mesh: &Mesh) -> Vec<StandardVertex> {
        let uvs = mesh.uvs(0).unwrap_or(&[]);
        mesh.positions()
            .iter()
            .enumerate()
            .map(|(i, position)| StandardVertex {
                position: *position,
                normal: mesh.normals().get(i).copied().unwrap_or([0.0; 3]),
                tangent: mesh.tangents().get(i).copied().unwrap_or([0.0; 3]),
                uv: uvs.get(i).copied().unwrap_or([0.0; 2]),
            })
            .collect()
    }
}

/// Every piece of GPU state a draw bakes into its `wgpu::RenderPipeline`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramHandle,
    pub blend: bool,
    pub cull: bool,
    pub depth_test: bool,
    pub depth_func: DepthFunc,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    fn blend_state(&self) -> wgpu::BlendState {
        match self.blend {
            true => wgpu::BlendState::ALPHA_BLENDING,
            false => wgpu::BlendState::REPLACE,
        }
    }

    fn depth_stencil(&self) -> wgpu::DepthStencilState {
        let (depth_write_enabled, depth_compare) = match (self.depth_test, self.depth_func) {
            (false, _) => (false, wgpu::CompareFunction::Always),
            (true, DepthFunc::Less) => (true, wgpu::CompareFunction::Less),
            (true, DepthFunc::LessEqual) => (true, wgpu::CompareFunction::LessEqual),
        };
        wgpu::DepthStencilState {
            format: GpuTexture::DEPTH_FORMAT,
            depth_write_enabled,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

/// Builds the pipeline for `key`.
///
/// Meshes wind clockwise seen from their front side, so back faces are the
/// counter-clockwise ones.
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    key: &PipelineKey,
    layout: &wgpu::PipelineLayout,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Material Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("vs_main"),
            buffers: &[StandardVertex::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: Some(key.blend_state()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Cw,
            cull_mode: key.cull.then_some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(key.depth_stencil()),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
