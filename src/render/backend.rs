//! The narrow interface the render pipeline drives the GPU through.
//!
//! Handles are opaque ids minted by the backend. The pipeline never looks
//! inside them; it only hands them back in later calls.

use crate::{
    data_structures::{mesh::Mesh, texture::Texture},
    math::{Mat4, Vec2, Vec3},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub u32);

/// An off-screen render target and its sampleable attachments.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Framebuffer {
    pub handle: FramebufferHandle,
    pub color: TextureHandle,
    pub depth: TextureHandle,
    pub width: u32,
    pub height: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    /// Triangle patches fed to tessellation stages.
    Patches,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    #[default]
    Less,
    LessEqual,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// Resolved shader sources for one program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
    pub tess_control: Option<String>,
    pub tess_evaluation: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("program {label} failed to compile: {log}")]
    Compile { label: String, log: String },
    #[error("texture {location} could not be uploaded: {reason}")]
    Texture { location: String, reason: String },
    #[error("mesh {0} has no vertices")]
    EmptyMesh(String),
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
    #[error("no render target is bound for this frame")]
    NoTarget,
    #[error("unknown {0} handle {1}")]
    UnknownHandle(&'static str, u32),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Immediate-mode GPU interface.
///
/// State setters (`set_blend`, `set_cull`, depth state, the bound program
/// and textures) persist until changed and apply to every following
/// `draw`. `begin_frame` and `end_frame` bracket the calls of one frame.
pub trait GpuBackend {
    fn create_vertex_array(
        &mut self,
        mesh: &Mesh,
        primitive: Primitive,
    ) -> Result<VertexArrayHandle, BackendError>;

    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, BackendError>;

    /// Uploads pixels with the texture's wrap, filter and mipmap settings.
    fn upload_texture(&mut self, texture: &Texture) -> Result<TextureHandle, BackendError>;

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<Framebuffer, BackendError>;

    /// Routes following draws to `framebuffer`, or to the screen with `None`.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    /// Clears the bound target's colour (when given) and optionally depth.
    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool);

    fn use_program(&mut self, program: ProgramHandle);

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue);

    fn bind_texture(&mut self, program: ProgramHandle, unit: u32, name: &str, texture: TextureHandle);

    fn draw(&mut self, vertex_array: VertexArrayHandle, primitive: Primitive);

    fn set_blend(&mut self, enabled: bool);

    fn set_cull(&mut self, enabled: bool);

    fn cull_enabled(&self) -> bool;

    fn set_depth_test(&mut self, enabled: bool);

    fn depth_test_enabled(&self) -> bool;

    fn set_depth_func(&mut self, func: DepthFunc);

    fn depth_func(&self) -> DepthFunc;

    fn begin_frame(&mut self) {}

    fn end_frame(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}
