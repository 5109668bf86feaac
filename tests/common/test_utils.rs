use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use reef_ngin::{
    data_structures::{material::Material, mesh::Mesh, texture::Texture},
    render::{
        backend::{
            BackendError, DepthFunc, Framebuffer, FramebufferHandle, GpuBackend, Primitive,
            ProgramHandle, ProgramSource, TextureHandle, UniformValue, VertexArrayHandle,
        },
        pipeline::{RenderPipeline, RenderSettings},
        registry::ShaderStage,
    },
};

/// Every call a [`RecordingBackend`] received, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateVertexArray(String, Primitive),
    CompileProgram(String),
    UploadTexture(String),
    CreateFramebuffer(u32, u32),
    BindFramebuffer(Option<FramebufferHandle>),
    Clear(Option<[f32; 4]>, bool),
    UseProgram(ProgramHandle),
    SetUniform(ProgramHandle, String, UniformValue),
    BindTexture(ProgramHandle, u32, String, TextureHandle),
    Draw(VertexArrayHandle, Primitive),
    SetBlend(bool),
    SetCull(bool),
    SetDepthTest(bool),
    SetDepthFunc(DepthFunc),
    BeginFrame,
    EndFrame,
}

/// A backend that hands out sequential handles and logs every call.
///
/// Programs whose vertex or fragment source contains one of
/// `failing_sources` fail to compile; textures whose location is in
/// `failing_textures` fail to upload.
#[derive(Debug)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    pub failing_sources: HashSet<String>,
    pub failing_textures: HashSet<String>,
    next_handle: u32,
    meshes: HashMap<VertexArrayHandle, String>,
    programs: HashMap<ProgramHandle, String>,
    textures: HashMap<TextureHandle, String>,
    cull: bool,
    depth_test: bool,
    depth_func: DepthFunc,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            failing_sources: HashSet::new(),
            failing_textures: HashSet::new(),
            next_handle: 1,
            meshes: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            cull: true,
            depth_test: true,
            depth_func: DepthFunc::Less,
        }
    }

    pub fn fail_source(mut self, marker: &str) -> Self {
        self.failing_sources.insert(marker.to_string());
        self
    }

    pub fn fail_texture(mut self, location: &str) -> Self {
        self.failing_textures.insert(location.to_string());
        self
    }

    fn next(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Names of the meshes drawn, in draw order.
    pub fn drawn_meshes(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(handle, _) => self.meshes.get(handle).cloned(),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub fn compile_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::CompileProgram(_)))
    }

    pub fn upload_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::UploadTexture(_)))
    }

    /// Position of the first call matching, if any.
    pub fn position(&self, matches: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(matches)
    }

    pub fn program_label(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(&program).map(String::as_str)
    }

    pub fn texture_location(&self, texture: TextureHandle) -> Option<&str> {
        self.textures.get(&texture).map(String::as_str)
    }

    /// The last value set for `name` on any program.
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::SetUniform(_, uniform, value) if uniform == name => Some(*value),
            _ => None,
        })
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for RecordingBackend {
    fn create_vertex_array(
        &mut self,
        mesh: &Mesh,
        primitive: Primitive,
    ) -> Result<VertexArrayHandle, BackendError> {
        self.calls
            .push(Call::CreateVertexArray(mesh.name().to_string(), primitive));
        if mesh.vertex_count() == 0 {
            return Err(BackendError::EmptyMesh(mesh.name().to_string()));
        }
        let handle = VertexArrayHandle(self.next());
        self.meshes.insert(handle, mesh.name().to_string());
        Ok(handle)
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, BackendError> {
        self.calls.push(Call::CompileProgram(source.label.clone()));
        let fails = self
            .failing_sources
            .iter()
            .any(|marker| source.vertex.contains(marker) || source.fragment.contains(marker));
        if fails {
            return Err(BackendError::Compile {
                label: source.label.clone(),
                log: "rejected by test".to_string(),
            });
        }
        let handle = ProgramHandle(self.next());
        self.programs.insert(handle, source.label.clone());
        Ok(handle)
    }

    fn upload_texture(&mut self, texture: &Texture) -> Result<TextureHandle, BackendError> {
        self.calls
            .push(Call::UploadTexture(texture.location().to_string()));
        if self.failing_textures.contains(texture.location()) {
            return Err(BackendError::Texture {
                location: texture.location().to_string(),
                reason: "rejected by test".to_string(),
            });
        }
        let handle = TextureHandle(self.next());
        self.textures.insert(handle, texture.location().to_string());
        Ok(handle)
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<Framebuffer, BackendError> {
        self.calls.push(Call::CreateFramebuffer(width, height));
        let handle = FramebufferHandle(self.next());
        let color = TextureHandle(self.next());
        let depth = TextureHandle(self.next());
        self.textures.insert(color, "framebuffer.color".to_string());
        self.textures.insert(depth, "framebuffer.depth".to_string());
        Ok(Framebuffer {
            handle,
            color,
            depth,
            width,
            height,
        })
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.calls.push(Call::BindFramebuffer(framebuffer));
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        self.calls.push(Call::Clear(color, depth));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.calls.push(Call::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        self.calls
            .push(Call::SetUniform(program, name.to_string(), value));
    }

    fn bind_texture(&mut self, program: ProgramHandle, unit: u32, name: &str, texture: TextureHandle) {
        self.calls
            .push(Call::BindTexture(program, unit, name.to_string(), texture));
    }

    fn draw(&mut self, vertex_array: VertexArrayHandle, primitive: Primitive) {
        self.calls.push(Call::Draw(vertex_array, primitive));
    }

    fn set_blend(&mut self, enabled: bool) {
        self.calls.push(Call::SetBlend(enabled));
    }

    fn set_cull(&mut self, enabled: bool) {
        self.cull = enabled;
        self.calls.push(Call::SetCull(enabled));
    }

    fn cull_enabled(&self) -> bool {
        self.cull
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
        self.calls.push(Call::SetDepthTest(enabled));
    }

    fn depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.depth_func = func;
        self.calls.push(Call::SetDepthFunc(func));
    }

    fn depth_func(&self) -> DepthFunc {
        self.depth_func
    }

    fn begin_frame(&mut self) {
        self.calls.push(Call::BeginFrame);
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::EndFrame);
        Ok(())
    }
}

pub const VERTEX: &str = "// standard vertex";
pub const FRAGMENT: &str = "// standard fragment";
pub const BROKEN: &str = "// broken";

/// A pipeline whose shaders live in memory only. Registers `standard`,
/// `broken` (which [`RecordingBackend::fail_source`] with [`BROKEN`]
/// rejects), the sky box and the post pass shaders.
pub fn test_pipeline(settings: RenderSettings) -> RenderPipeline {
    let settings = RenderSettings {
        shader_root: std::env::temp_dir().join("reef-ngin-no-shaders"),
        ..settings
    };
    RenderPipeline::new(settings)
        .with_shader(ShaderStage::Vertex, "standard", VERTEX)
        .with_shader(ShaderStage::Fragment, "standard", FRAGMENT)
        .with_shader(ShaderStage::Vertex, "broken", BROKEN)
        .with_shader(ShaderStage::Fragment, "broken", BROKEN)
        .with_shader(ShaderStage::Vertex, "skybox", "// skybox vertex")
        .with_shader(ShaderStage::Fragment, "skybox", "// skybox fragment")
        .with_shader(ShaderStage::Vertex, "post/post", "// post vertex")
        .with_shader(ShaderStage::Fragment, "post/grayscale", "// grayscale")
}

pub fn material(name: &str) -> Rc<Material> {
    Rc::new(Material::new(name, "standard", "standard"))
}

pub fn solid(location: &str) -> Rc<Texture> {
    Rc::new(Texture::solid(location, [255, 255, 255, 255]))
}
