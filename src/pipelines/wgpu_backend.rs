//! [`GpuBackend`] on top of wgpu.
//!
//! wgpu has no global state machine, so calls are recorded: every draw
//! captures the current program, blend/cull/depth state, uniform values and
//! texture bindings. `end_frame` replays the recording as one render pass per
//! target switch or clear and submits it.

use std::{collections::HashMap, iter, num::NonZeroU64};

use instant::Duration;
use log::{debug, warn};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{mesh::Mesh, texture::Texture},
    pipelines::{
        basic::{PipelineKey, StandardVertex, mk_render_pipeline},
        reflect::{self, MAX_UNIFORM_SIZE, ProgramLayout},
        texture::{GpuTexture, TextureKind},
    },
    render::backend::{
        BackendError, DepthFunc, Framebuffer, FramebufferHandle, GpuBackend, Primitive,
        ProgramHandle, ProgramSource, TextureHandle, UniformValue, VertexArrayHandle,
    },
};

struct Program {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layout: ProgramLayout,
    pipeline_layout: wgpu::PipelineLayout,
    texture_layout: Option<wgpu::BindGroupLayout>,
    /// Uniform block contents; persists across draws like GL program state.
    uniforms: Vec<u8>,
    /// Bound texture per slot of `layout.textures`.
    textures: Vec<Option<TextureHandle>>,
}

struct VertexArray {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    count: u32,
}

#[derive(Copy, Clone, Debug)]
struct FramebufferTargets {
    color: TextureHandle,
    depth: TextureHandle,
}

type TextureGroupKey = (ProgramHandle, Vec<Option<TextureHandle>>);

struct DrawRecord {
    pipeline: PipelineKey,
    vertex_array: VertexArrayHandle,
    uniform_offset: u32,
    textures: Option<TextureGroupKey>,
}

struct PassRecord {
    target: Option<FramebufferHandle>,
    clear_color: Option<[f32; 4]>,
    clear_depth: bool,
    draws: Vec<DrawRecord>,
}

#[derive(Copy, Clone, Debug)]
struct RenderState {
    program: Option<ProgramHandle>,
    target: Option<FramebufferHandle>,
    blend: bool,
    cull: bool,
    depth_test: bool,
    depth_func: DepthFunc,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            program: None,
            target: None,
            blend: false,
            cull: true,
            depth_test: true,
            depth_func: DepthFunc::Less,
        }
    }
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    uniform_layout: wgpu::BindGroupLayout,
    slot_size: u32,
    uniform_buffer: Option<(wgpu::Buffer, wgpu::BindGroup)>,
    programs: Vec<Program>,
    vertex_arrays: Vec<VertexArray>,
    textures: Vec<GpuTexture>,
    framebuffers: Vec<FramebufferTargets>,
    fallbacks: HashMap<TextureKind, GpuTexture>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    texture_groups: HashMap<TextureGroupKey, wgpu::BindGroup>,
    screen: Option<(wgpu::TextureView, wgpu::TextureView)>,
    state: RenderState,
    passes: Vec<PassRecord>,
    staging: Vec<u8>,
}

impl WgpuBackend {
    /// `format` is the colour format of the screen and of every framebuffer.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("uniform_bind_group_layout"),
        });
        let alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let slot_size = MAX_UNIFORM_SIZE.div_ceil(alignment) * alignment;
        let fallbacks = [TextureKind::D2, TextureKind::Cube, TextureKind::Depth]
            .into_iter()
            .map(|kind| (kind, GpuTexture::fallback(&device, &queue, kind)))
            .collect();
        Self {
            device,
            queue,
            format,
            uniform_layout,
            slot_size,
            uniform_buffer: None,
            programs: Vec::new(),
            vertex_arrays: Vec::new(),
            textures: Vec::new(),
            framebuffers: Vec::new(),
            fallbacks,
            pipelines: HashMap::new(),
            texture_groups: HashMap::new(),
            screen: None,
            state: RenderState::default(),
            passes: Vec::new(),
            staging: Vec::new(),
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Sets the views draws to the screen (`bind_framebuffer(None)`) land in.
    pub fn set_screen(&mut self, color: wgpu::TextureView, depth: wgpu::TextureView) {
        self.screen = Some((color, depth));
    }

    /// Uses an off-screen framebuffer as the screen, for headless rendering.
    pub fn set_screen_framebuffer(&mut self, framebuffer: &Framebuffer) -> Result<(), BackendError> {
        let color = self.texture(framebuffer.color)?.view.clone();
        let depth = self.texture(framebuffer.depth)?.view.clone();
        self.screen = Some((color, depth));
        Ok(())
    }

    pub fn clear_screen(&mut self) {
        self.screen = None;
    }

    /// Number of distinct pipeline state objects built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn texture(&self, handle: TextureHandle) -> Result<&GpuTexture, BackendError> {
        self.textures
            .get(handle.0 as usize)
            .ok_or(BackendError::UnknownHandle("texture", handle.0))
    }

    fn program_mut(&mut self, handle: ProgramHandle) -> Option<&mut Program> {
        let program = self.programs.get_mut(handle.0 as usize);
        if program.is_none() {
            warn!("Unknown program handle {}", handle.0);
        }
        program
    }

    fn push_texture(&mut self, texture: GpuTexture) -> TextureHandle {
        self.textures.push(texture);
        TextureHandle(self.textures.len() as u32 - 1)
    }

    fn current_pass(&mut self) -> &mut PassRecord {
        let target = self.state.target;
        if self.passes.last().is_none_or(|pass| pass.target != target) {
            self.passes.push(PassRecord {
                target,
                clear_color: None,
                clear_depth: false,
                draws: Vec::new(),
            });
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    fn texture_layout(device: &wgpu::Device, layout: &ProgramLayout) -> Option<wgpu::BindGroupLayout> {
        if layout.textures.is_empty() {
            return None;
        }
        let visibility = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let mut entries = Vec::new();
        for slot in &layout.textures {
            let (sample_type, view_dimension, sampler) = match slot.kind {
                TextureKind::D2 => (
                    wgpu::TextureSampleType::Float { filterable: true },
                    wgpu::TextureViewDimension::D2,
                    wgpu::SamplerBindingType::Filtering,
                ),
                TextureKind::Cube => (
                    wgpu::TextureSampleType::Float { filterable: true },
                    wgpu::TextureViewDimension::Cube,
                    wgpu::SamplerBindingType::Filtering,
                ),
                TextureKind::Depth => (
                    wgpu::TextureSampleType::Depth,
                    wgpu::TextureViewDimension::D2,
                    wgpu::SamplerBindingType::NonFiltering,
                ),
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension,
                    sample_type,
                },
                count: None,
            });
            if let Some(binding) = slot.sampler {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility,
                    ty: wgpu::BindingType::Sampler(sampler),
                    count: None,
                });
            }
        }
        Some(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &entries,
            label: Some("texture_bind_group_layout"),
        }))
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let Some(program) = self.programs.get(key.program.0 as usize) else {
            return;
        };
        debug!("Building pipeline for {} ({:?})", program.label, key);
        let pipeline = mk_render_pipeline(
            &self.device,
            &key,
            &program.pipeline_layout,
            &program.vertex,
            &program.fragment,
        );
        self.pipelines.insert(key, pipeline);
    }

    fn ensure_texture_group(&mut self, key: &TextureGroupKey) {
        if self.texture_groups.contains_key(key) {
            return;
        }
        let Some(program) = self.programs.get(key.0.0 as usize) else {
            return;
        };
        let Some(layout) = &program.texture_layout else {
            return;
        };
        let mut bound = Vec::new();
        for (slot, handle) in program.layout.textures.iter().zip(&key.1) {
            let texture = handle
                .and_then(|handle| self.textures.get(handle.0 as usize))
                .filter(|texture| texture.kind == slot.kind)
                .or_else(|| self.fallbacks.get(&slot.kind));
            if let Some(texture) = texture {
                bound.push((slot, texture));
            }
        }
        let mut entries = Vec::new();
        for (slot, texture) in &bound {
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            if let Some(binding) = slot.sampler {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                });
            }
        }
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &entries,
            label: Some("texture_bind_group"),
        });
        self.texture_groups.insert(key.clone(), group);
    }

    fn ensure_uniform_capacity(&mut self, size: u64) {
        let size = size.max(self.slot_size as u64);
        if let Some((buffer, _)) = &self.uniform_buffer {
            if buffer.size() >= size {
                return;
            }
        }
        let size = size.next_power_of_two();
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Buffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(self.slot_size as u64),
                }),
            }],
            label: Some("uniform_bind_group"),
        });
        self.uniform_buffer = Some((buffer, group));
    }

    fn target_views(
        &self,
        target: Option<FramebufferHandle>,
    ) -> Result<(&wgpu::TextureView, &wgpu::TextureView), BackendError> {
        match target {
            None => self
                .screen
                .as_ref()
                .map(|(color, depth)| (color, depth))
                .ok_or(BackendError::NoTarget),
            Some(handle) => {
                let targets = self
                    .framebuffers
                    .get(handle.0 as usize)
                    .ok_or(BackendError::UnknownHandle("framebuffer", handle.0))?;
                Ok((
                    &self.texture(targets.color)?.view,
                    &self.texture(targets.depth)?.view,
                ))
            }
        }
    }

    /// Copies the colour attachment of `framebuffer` back to the CPU.
    pub async fn read_framebuffer(&self, framebuffer: &Framebuffer) -> anyhow::Result<image::RgbaImage> {
        let texture = &self.texture(framebuffer.color)?.texture;
        let (width, height) = (framebuffer.width.max(1), framebuffer.height.max(1));
        let unpadded = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Framebuffer Readback"),
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        // The mapping has to be requested before polling.
        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })?;
        rx.receive()
            .await
            .ok_or_else(|| anyhow::anyhow!("readback channel closed"))??;

        let data = buffer_slice.get_mapped_range();
        let swap = matches!(
            self.format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );
        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        for row in data.chunks(padded as usize).take(height as usize) {
            for px in row[..unpadded as usize].chunks_exact(4) {
                match swap {
                    true => pixels.extend_from_slice(&[px[2], px[1], px[0], px[3]]),
                    false => pixels.extend_from_slice(px),
                }
            }
        }
        drop(data);
        output_buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow::anyhow!("readback size mismatch"))
    }
}

impl GpuBackend for WgpuBackend {
    fn create_vertex_array(
        &mut self,
        mesh: &Mesh,
        primitive: Primitive,
    ) -> Result<VertexArrayHandle, BackendError> {
        if primitive == Primitive::Patches {
            return Err(BackendError::Unsupported("tessellation"));
        }
        if mesh.vertex_count() == 0 || mesh.indices().is_empty() {
            return Err(BackendError::EmptyMesh(mesh.name().to_string()));
        }
        let vertices = StandardVertex::interleave(mesh);
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Vertex Buffer", mesh.name())),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Index Buffer", mesh.name())),
                contents: bytemuck::cast_slice(mesh.indices()),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.vertex_arrays.push(VertexArray {
            vertices: vertex_buffer,
            indices: index_buffer,
            count: mesh.indices().len() as u32,
        });
        Ok(VertexArrayHandle(self.vertex_arrays.len() as u32 - 1))
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, BackendError> {
        if source.tess_control.is_some() || source.tess_evaluation.is_some() {
            return Err(BackendError::Unsupported("tessellation"));
        }
        let layout = reflect::reflect_program(&source.vertex, &source.fragment).map_err(|log| {
            BackendError::Compile {
                label: source.label.clone(),
                log,
            }
        })?;
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} vertex", source.label)),
                source: wgpu::ShaderSource::Wgsl(source.vertex.as_str().into()),
            });
        let fragment = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} fragment", source.label)),
                source: wgpu::ShaderSource::Wgsl(source.fragment.as_str().into()),
            });
        let texture_layout = Self::texture_layout(&self.device, &layout);
        let pipeline_layout = {
            let mut groups = vec![&self.uniform_layout];
            if let Some(texture_layout) = &texture_layout {
                groups.push(texture_layout);
            }
            self.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&source.label),
                    bind_group_layouts: &groups,
                    push_constant_ranges: &[],
                })
        };
        let uniforms = vec![0; layout.uniform_size as usize];
        let textures = vec![None; layout.textures.len()];
        self.programs.push(Program {
            label: source.label.clone(),
            vertex,
            fragment,
            layout,
            pipeline_layout,
            texture_layout,
            uniforms,
            textures,
        });
        Ok(ProgramHandle(self.programs.len() as u32 - 1))
    }

    fn upload_texture(&mut self, texture: &Texture) -> Result<TextureHandle, BackendError> {
        let gpu = GpuTexture::from_texture(&self.device, &self.queue, texture).map_err(|e| {
            BackendError::Texture {
                location: texture.location().to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(self.push_texture(gpu))
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<Framebuffer, BackendError> {
        let color = GpuTexture::create_color_target(
            &self.device,
            [width, height],
            self.format,
            "framebuffer colour",
        );
        let depth = GpuTexture::create_depth_texture(&self.device, [width, height], "framebuffer depth");
        let color = self.push_texture(color);
        let depth = self.push_texture(depth);
        self.framebuffers.push(FramebufferTargets { color, depth });
        Ok(Framebuffer {
            handle: FramebufferHandle(self.framebuffers.len() as u32 - 1),
            color,
            depth,
            width: width.max(1),
            height: height.max(1),
        })
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.state.target = framebuffer;
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        let target = self.state.target;
        let merge = self
            .passes
            .last()
            .is_some_and(|pass| pass.target == target && pass.draws.is_empty());
        if !merge {
            self.passes.push(PassRecord {
                target,
                clear_color: None,
                clear_depth: false,
                draws: Vec::new(),
            });
        }
        let pass = self.current_pass();
        if color.is_some() {
            pass.clear_color = color;
        }
        pass.clear_depth |= depth;
    }

    fn use_program(&mut self, program: ProgramHandle) {
        if self.program_mut(program).is_some() {
            self.state.program = Some(program);
        }
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        let Some(program) = self.program_mut(program) else {
            return;
        };
        // Names the program does not declare are ignored.
        let Some(member) = program.layout.members.get(name) else {
            return;
        };
        if !member.ty.accepts(&value) {
            debug!("{}: {:?} does not fit uniform {}", program.label, value, name);
            return;
        }
        let bytes = reflect::uniform_bytes(&value);
        let start = member.offset as usize;
        if let Some(target) = program.uniforms.get_mut(start..start + bytes.len()) {
            target.copy_from_slice(&bytes);
        }
    }

    fn bind_texture(&mut self, program: ProgramHandle, unit: u32, name: &str, texture: TextureHandle) {
        let kind = match self.texture(texture) {
            Ok(texture) => texture.kind,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };
        let Some(program) = self.program_mut(program) else {
            return;
        };
        let Some(slot) = program.layout.texture_slot(unit, name) else {
            return;
        };
        if program.layout.textures[slot].kind != kind {
            warn!(
                "{}: texture {} is a {:?} texture, the program expects {:?}",
                program.label, name, kind, program.layout.textures[slot].kind
            );
            return;
        }
        program.textures[slot] = Some(texture);
    }

    fn draw(&mut self, vertex_array: VertexArrayHandle, primitive: Primitive) {
        if primitive == Primitive::Patches {
            warn!("Patches cannot be drawn without tessellation support");
            return;
        }
        let Some(handle) = self.state.program else {
            warn!("Draw without a program in use");
            return;
        };
        if self.vertex_arrays.get(vertex_array.0 as usize).is_none() {
            warn!("Unknown vertex array handle {}", vertex_array.0);
            return;
        }
        let key = PipelineKey {
            program: handle,
            blend: self.state.blend,
            cull: self.state.cull,
            depth_test: self.state.depth_test,
            depth_func: self.state.depth_func,
            format: self.format,
        };
        self.ensure_pipeline(key);

        let Some(program) = self.programs.get(handle.0 as usize) else {
            return;
        };
        let uniform_offset = self.staging.len();
        self.staging.extend_from_slice(&program.uniforms);
        self.staging
            .resize(uniform_offset + self.slot_size as usize, 0);
        let textures = program
            .texture_layout
            .as_ref()
            .map(|_| (handle, program.textures.clone()));
        if let Some(textures) = &textures {
            self.ensure_texture_group(textures);
        }

        self.current_pass().draws.push(DrawRecord {
            pipeline: key,
            vertex_array,
            uniform_offset: uniform_offset as u32,
            textures,
        });
    }

    fn set_blend(&mut self, enabled: bool) {
        self.state.blend = enabled;
    }

    fn set_cull(&mut self, enabled: bool) {
        self.state.cull = enabled;
    }

    fn cull_enabled(&self) -> bool {
        self.state.cull
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn depth_test_enabled(&self) -> bool {
        self.state.depth_test
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.state.depth_func = func;
    }

    fn depth_func(&self) -> DepthFunc {
        self.state.depth_func
    }

    fn begin_frame(&mut self) {
        self.passes.clear();
        self.staging.clear();
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let passes = std::mem::take(&mut self.passes);
        let staging = std::mem::take(&mut self.staging);
        if passes.is_empty() {
            return Ok(());
        }
        self.ensure_uniform_capacity(staging.len() as u64);
        let Some((uniform_buffer, uniform_group)) = &self.uniform_buffer else {
            return Err(BackendError::NoTarget);
        };
        if !staging.is_empty() {
            self.queue.write_buffer(uniform_buffer, 0, &staging);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        for pass in &passes {
            if pass.draws.is_empty() && pass.clear_color.is_none() && !pass.clear_depth {
                continue;
            }
            let (color, depth) = self.target_views(pass.target)?;
            let load = match pass.clear_color {
                Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                }),
                None => wgpu::LoadOp::Load,
            };
            let depth_load = match pass.clear_depth {
                true => wgpu::LoadOp::Clear(1.0),
                false => wgpu::LoadOp::Load,
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &pass.draws {
                let (Some(pipeline), Some(vertex_array)) = (
                    self.pipelines.get(&draw.pipeline),
                    self.vertex_arrays.get(draw.vertex_array.0 as usize),
                ) else {
                    continue;
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, uniform_group, &[draw.uniform_offset]);
                if let Some(key) = &draw.textures {
                    match self.texture_groups.get(key) {
                        Some(group) => render_pass.set_bind_group(1, group, &[]),
                        None => continue,
                    }
                }
                render_pass.set_vertex_buffer(0, vertex_array.vertices.slice(..));
                render_pass.set_index_buffer(vertex_array.indices.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..vertex_array.count, 0, 0..1);
            }
        }
        self.queue.submit(iter::once(encoder.finish()));
        Ok(())
    }
}
