//! Frame submission: decides what gets drawn, in which order and with which
//! GPU state.
//!
//! Renderers are bucketed by their object's layer value, each bucket is
//! stable-sorted by the material's `order_in_queue`, and every enabled camera
//! draws the buckets its layer mask selects in ascending layer order. There
//! is no depth sort, so blended geometry relies on `order_in_queue`.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::PathBuf,
    rc::Rc,
};

use cgmath::SquareMatrix;
use log::{error, warn};

use crate::{
    data_structures::{
        camera::Camera,
        layer::Layers,
        material::{Material, PropertyValue},
        mesh::{Mesh, MeshId},
        renderer::MeshRenderer,
        scene_graph::{Scene, SceneObject},
        texture::Texture,
    },
    flow::FrameContext,
    math::{self, Mat4, Vec2, Vec3},
    render::{
        backend::{
            BackendError, DepthFunc, Framebuffer, GpuBackend, Primitive, ProgramHandle,
            TextureHandle, UniformValue, VertexArrayHandle,
        },
        registry::{BakeStatus, MaterialRegistry, ShaderLibrary, ShaderStage, TextureAtlas},
    },
};

pub const VIEW_MATRIX: &str = "_ViewMatrix";
pub const PROJECTION_MATRIX: &str = "_ProjectionMatrix";
pub const MODEL_MATRIX: &str = "_ModelMatrix";
pub const VIEW_POS: &str = "_ViewPos";
pub const TIME: &str = "_Time";
pub const SKYBOX: &str = "_Skybox";
pub const MAIN_TEX: &str = "_MainTex";
pub const DEPTH_TEX: &str = "_DepthTex";
pub const SCREEN_SIZE: &str = "_ScreenSize";

const SKYBOX_MATERIAL: &str = "Skybox";
const POST_PROCESS_MATERIAL: &str = "PostProcess";

#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Root directory of `<id>.<stage>.wgsl` shader files.
    pub shader_root: PathBuf,
    /// Fragment shader id under `post/` for the full-screen pass.
    pub post_process: Option<String>,
    /// Layers drawn with alpha blending.
    pub blended_layers: Layers,
    pub width: u32,
    pub height: u32,
    /// Cleared to when the scene has no enabled camera.
    pub clear_color: [f32; 4],
    pub skybox_vertex: String,
    pub skybox_fragment: String,
    pub post_vertex: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shader_root: PathBuf::from("assets").join("shaders"),
            post_process: None,
            blended_layers: Layers::TRANSPARENT | Layers::WATER,
            width: 1280,
            height: 720,
            clear_color: [0.1, 0.1, 0.1, 1.0],
            skybox_vertex: "skybox".to_string(),
            skybox_fragment: "skybox".to_string(),
            post_vertex: "post/post".to_string(),
        }
    }
}

/// Counters describing one submitted frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub cameras: usize,
    pub layers: usize,
    pub draws: usize,
    pub skipped: usize,
}

struct DrawItem<'s> {
    object: &'s SceneObject,
    renderer: &'s MeshRenderer,
}

struct CameraView {
    view: Mat4,
    projection: Mat4,
    position: Vec3,
}

#[derive(Debug)]
pub struct RenderPipeline {
    settings: RenderSettings,
    shaders: ShaderLibrary,
    materials: MaterialRegistry,
    textures: TextureAtlas,
    vertex_arrays: HashMap<(MeshId, Primitive), VertexArrayHandle>,
    skybox_mesh: Rc<Mesh>,
    skybox_material: Rc<Material>,
    screen_quad: Rc<Mesh>,
    post_material: Option<Rc<Material>>,
    framebuffer: Option<Framebuffer>,
    reported: HashSet<String>,
}

impl RenderPipeline {
    pub fn new(settings: RenderSettings) -> Self {
        let shaders = ShaderLibrary::new(&settings.shader_root);
        let skybox_material = Rc::new(
            Material::new(
                SKYBOX_MATERIAL,
                &settings.skybox_vertex,
                &settings.skybox_fragment,
            )
            .with_both_faces(true),
        );
        let post_material = settings.post_process.as_ref().map(|fragment| {
            Rc::new(
                Material::new(
                    POST_PROCESS_MATERIAL,
                    &settings.post_vertex,
                    &format!("post/{}", fragment),
                )
                .with_both_faces(true),
            )
        });
        Self {
            settings,
            shaders,
            materials: MaterialRegistry::new(),
            textures: TextureAtlas::new(),
            vertex_arrays: HashMap::new(),
            skybox_mesh: Rc::new(Mesh::cube()),
            skybox_material,
            screen_quad: Rc::new(Mesh::quad(2.0, Vec3::new(0.0, 0.0, 0.0))),
            post_material,
            framebuffer: None,
            reported: HashSet::new(),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    /// Registers an in-memory shader source, overriding files on disk.
    pub fn with_shader(mut self, stage: ShaderStage, id: &str, source: &str) -> Self {
        self.shaders.insert(stage, id, source);
        self
    }

    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialRegistry {
        &mut self.materials
    }

    pub fn textures(&self) -> &TextureAtlas {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureAtlas {
        &mut self.textures
    }

    pub fn framebuffer(&self) -> Option<&Framebuffer> {
        self.framebuffer.as_ref()
    }

    /// The off-screen target is rebuilt at the new size on the next draw.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.settings.width = width;
        self.settings.height = height;
        self.framebuffer = None;
    }

    /// Queues every material and texture the scene currently references.
    pub fn prepare(&mut self, scene: &Scene) {
        for (_, renderer) in scene.renderers() {
            self.materials.add(&renderer.material);
            for (_, texture) in renderer.properties.textures() {
                self.textures.add(texture);
            }
        }
        for (_, camera) in scene.cameras() {
            if let Some(skybox) = &camera.skybox {
                self.materials.add(&self.skybox_material);
                self.textures.add(skybox);
            }
        }
        if let Some(post) = &self.post_material {
            self.materials.add(post);
        }
    }

    /// Drains both registries.
    pub fn bake(&mut self, backend: &mut dyn GpuBackend) {
        self.materials.bake(&mut self.shaders, backend);
        self.textures.bake(backend);
    }

    /// Submits one frame for every enabled camera.
    pub fn draw(
        &mut self,
        scene: &Scene,
        frame: &FrameContext,
        backend: &mut dyn GpuBackend,
    ) -> Result<FrameStats, BackendError> {
        let mut stats = FrameStats::default();
        backend.begin_frame();

        let buckets = Self::buckets(scene);
        let cameras: Vec<(&SceneObject, &Camera)> = scene.cameras().collect();
        if cameras.is_empty() {
            self.report_once("no-camera", || {
                warn!("The scene has no enabled camera, nothing is drawn.")
            });
        }

        let post_ready = match self.post_material.clone() {
            Some(material) => {
                let ready = self.resolve_program(&material, backend).is_some();
                if !ready {
                    self.report_once("post-disabled", || {
                        warn!("The post process is unusable, drawing straight to the screen.")
                    });
                }
                ready
            }
            None => false,
        };
        let offscreen = match post_ready {
            true => Some(self.offscreen_target(backend)?),
            false => None,
        };
        backend.bind_framebuffer(offscreen.map(|fb| fb.handle));
        if cameras.is_empty() {
            backend.clear(Some(self.settings.clear_color), true);
        }

        let mut first_view = None;
        for (i, (object, camera)) in cameras.iter().enumerate() {
            stats.cameras += 1;
            let clear_color = (i == 0).then_some(camera.clear_color);
            backend.clear(clear_color, true);

            let view = Self::camera_view(object, camera);
            for (bits, items) in &buckets {
                let layer = Layers::from_bits_retain(*bits);
                if !camera.sees(layer) {
                    continue;
                }
                stats.layers += 1;
                let blend = layer.intersects(self.settings.blended_layers);
                if blend {
                    backend.set_blend(true);
                }
                for item in items {
                    if self.draw_renderer(item, &view, frame, backend) {
                        stats.draws += 1;
                    } else {
                        stats.skipped += 1;
                    }
                }
                if blend {
                    backend.set_blend(false);
                }
            }

            if let Some(skybox) = &camera.skybox {
                if self.draw_skybox(skybox, &view, frame, backend) {
                    stats.draws += 1;
                } else {
                    stats.skipped += 1;
                }
            }
            first_view.get_or_insert(view);
        }

        if let Some(framebuffer) = offscreen {
            backend.bind_framebuffer(None);
            backend.clear(Some([0.0, 0.0, 0.0, 1.0]), true);
            let view = first_view.unwrap_or(CameraView {
                view: Mat4::identity(),
                projection: Mat4::identity(),
                position: Vec3::new(0.0, 0.0, 0.0),
            });
            if self.draw_post_process(&framebuffer, &view, frame, backend) {
                stats.draws += 1;
            } else {
                stats.skipped += 1;
            }
        }

        backend.end_frame()?;
        Ok(stats)
    }

    /// Layer value to renderers, each bucket stable-sorted by queue order.
    fn buckets(scene: &Scene) -> BTreeMap<u32, Vec<DrawItem<'_>>> {
        let mut buckets: BTreeMap<u32, Vec<DrawItem<'_>>> = BTreeMap::new();
        for (object, renderer) in scene.renderers() {
            buckets
                .entry(object.layer.bits())
                .or_default()
                .push(DrawItem { object, renderer });
        }
        for items in buckets.values_mut() {
            items.sort_by_key(|item| item.renderer.material.order_in_queue);
        }
        buckets
    }

    fn camera_view(object: &SceneObject, camera: &Camera) -> CameraView {
        let world = object.transform().world_matrix();
        let view = world.invert().unwrap_or_else(|| {
            warn!("Camera {} has a singular transform.", object.name);
            Mat4::identity()
        });
        CameraView {
            view,
            projection: camera.projection(),
            position: math::translation_of(&world),
        }
    }

    fn offscreen_target(&mut self, backend: &mut dyn GpuBackend) -> Result<Framebuffer, BackendError> {
        if let Some(framebuffer) = self.framebuffer {
            return Ok(framebuffer);
        }
        let framebuffer = backend.create_framebuffer(self.settings.width, self.settings.height)?;
        self.framebuffer = Some(framebuffer);
        Ok(framebuffer)
    }

    /// The program for `material`, baking it on the spot if it was never
    /// seen. Failed materials are reported once and yield `None`.
    fn resolve_program(
        &mut self,
        material: &Rc<Material>,
        backend: &mut dyn GpuBackend,
    ) -> Option<ProgramHandle> {
        if matches!(
            self.materials.status(&material.name),
            BakeStatus::Unknown | BakeStatus::Pending
        ) {
            self.materials.add(material);
            self.materials.bake(&mut self.shaders, backend);
        }
        let program = self.materials.program(&material.name);
        if program.is_none() {
            let name = material.name.clone();
            self.report_once(&format!("material:{}", name), || {
                error!("Material {} has no usable program; its draws are skipped.", name)
            });
        }
        program
    }

    fn resolve_texture(
        &mut self,
        texture: &Rc<Texture>,
        backend: &mut dyn GpuBackend,
    ) -> Option<TextureHandle> {
        if matches!(
            self.textures.status(texture.location()),
            BakeStatus::Unknown | BakeStatus::Pending
        ) {
            self.textures.add(texture);
            self.textures.bake(backend);
        }
        let handle = self.textures.handle(texture.location());
        if handle.is_none() {
            let location = texture.location().to_string();
            self.report_once(&format!("texture:{}", location), || {
                error!("Texture {} was never baked and is left unbound.", location)
            });
        }
        handle
    }

    fn vertex_array(
        &mut self,
        mesh: &Mesh,
        primitive: Primitive,
        backend: &mut dyn GpuBackend,
    ) -> Option<VertexArrayHandle> {
        let key = (mesh.id(), primitive);
        if let Some(handle) = self.vertex_arrays.get(&key) {
            return Some(*handle);
        }
        match backend.create_vertex_array(mesh, primitive) {
            Ok(handle) => {
                self.vertex_arrays.insert(key, handle);
                Some(handle)
            }
            Err(e) => {
                let name = mesh.name().to_string();
                self.report_once(&format!("mesh:{:?}", mesh.id()), || {
                    error!("Mesh {} cannot be drawn: {}", name, e)
                });
                None
            }
        }
    }

    fn set_standard_uniforms(
        backend: &mut dyn GpuBackend,
        program: ProgramHandle,
        view: &CameraView,
        model: Mat4,
        frame: &FrameContext,
    ) {
        backend.set_uniform(program, VIEW_MATRIX, UniformValue::Mat4(view.view));
        backend.set_uniform(program, PROJECTION_MATRIX, UniformValue::Mat4(view.projection));
        backend.set_uniform(program, MODEL_MATRIX, UniformValue::Mat4(model));
        backend.set_uniform(program, VIEW_POS, UniformValue::Vec3(view.position));
        backend.set_uniform(program, TIME, UniformValue::Float(frame.elapsed));
    }

    fn draw_renderer(
        &mut self,
        item: &DrawItem<'_>,
        view: &CameraView,
        frame: &FrameContext,
        backend: &mut dyn GpuBackend,
    ) -> bool {
        let material = &item.renderer.material;
        let Some(program) = self.resolve_program(material, backend) else {
            return false;
        };
        let primitive = match material.is_tessellated() {
            true => Primitive::Patches,
            false => Primitive::Triangles,
        };
        let Some(vertex_array) = self.vertex_array(&item.renderer.mesh, primitive, backend) else {
            return false;
        };

        backend.use_program(program);
        let model = item.object.transform().world_matrix();
        Self::set_standard_uniforms(backend, program, view, model, frame);

        let mut unit = 0;
        for (name, value) in item.renderer.properties.iter() {
            match value {
                PropertyValue::Float(v) => backend.set_uniform(program, name, UniformValue::Float(*v)),
                PropertyValue::Int(v) => backend.set_uniform(program, name, UniformValue::Int(*v)),
                PropertyValue::Vector3(v) => {
                    backend.set_uniform(program, name, UniformValue::Vec3(*v))
                }
                PropertyValue::Texture(texture) => {
                    if let Some(handle) = self.resolve_texture(texture, backend) {
                        backend.bind_texture(program, unit, name, handle);
                    }
                    unit += 1;
                }
            }
        }

        let both_faces = material.render_both_faces;
        let cull = backend.cull_enabled();
        if both_faces {
            backend.set_cull(false);
        }
        backend.draw(vertex_array, primitive);
        if both_faces {
            backend.set_cull(cull);
        }
        true
    }

    fn draw_skybox(
        &mut self,
        skybox: &Rc<Texture>,
        view: &CameraView,
        frame: &FrameContext,
        backend: &mut dyn GpuBackend,
    ) -> bool {
        let material = self.skybox_material.clone();
        let Some(program) = self.resolve_program(&material, backend) else {
            return false;
        };
        let Some(texture) = self.resolve_texture(skybox, backend) else {
            return false;
        };
        let mesh = self.skybox_mesh.clone();
        let Some(vertex_array) = self.vertex_array(&mesh, Primitive::Triangles, backend) else {
            return false;
        };

        let depth_func = backend.depth_func();
        let cull = backend.cull_enabled();
        backend.set_depth_func(DepthFunc::LessEqual);
        backend.set_cull(false);

        backend.use_program(program);
        Self::set_standard_uniforms(backend, program, view, Mat4::identity(), frame);
        backend.bind_texture(program, 0, SKYBOX, texture);
        backend.draw(vertex_array, Primitive::Triangles);

        backend.set_cull(cull);
        backend.set_depth_func(depth_func);
        true
    }

    fn draw_post_process(
        &mut self,
        framebuffer: &Framebuffer,
        view: &CameraView,
        frame: &FrameContext,
        backend: &mut dyn GpuBackend,
    ) -> bool {
        let Some(material) = self.post_material.clone() else {
            return false;
        };
        let Some(program) = self.resolve_program(&material, backend) else {
            return false;
        };
        let quad = self.screen_quad.clone();
        let Some(vertex_array) = self.vertex_array(&quad, Primitive::Triangles, backend) else {
            return false;
        };

        let cull = backend.cull_enabled();
        let depth_test = backend.depth_test_enabled();
        backend.set_depth_test(false);
        backend.set_cull(false);

        backend.use_program(program);
        backend.set_uniform(program, MAIN_TEX, UniformValue::Int(0));
        backend.set_uniform(program, DEPTH_TEX, UniformValue::Int(1));
        backend.set_uniform(
            program,
            SCREEN_SIZE,
            UniformValue::Vec2(Vec2::new(framebuffer.width as f32, framebuffer.height as f32)),
        );
        backend.set_uniform(program, VIEW_POS, UniformValue::Vec3(view.position));
        backend.set_uniform(program, TIME, UniformValue::Float(frame.elapsed));
        backend.bind_texture(program, 0, MAIN_TEX, framebuffer.color);
        backend.bind_texture(program, 1, DEPTH_TEX, framebuffer.depth);
        backend.draw(vertex_array, Primitive::Triangles);

        backend.set_cull(cull);
        backend.set_depth_test(depth_test);
        true
    }

    fn report_once(&mut self, key: &str, report: impl FnOnce()) {
        if self.reported.insert(key.to_string()) {
            report();
        }
    }
}
