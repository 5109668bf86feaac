//! Frame loop and application event loop.
//!
//! An [`Engine`] owns the scene, the render pipeline and the input handlers
//! and runs one frame at a time against any [`GpuBackend`]. [`run`] wraps it
//! in a winit window with a wgpu surface.
//!
//! # Lifecycle
//!
//! Each frame:
//! 1. Window events are forwarded to the [`InputHandlers`]
//! 2. `Scene::update` runs every animator and behaviour in scene order
//! 3. The pipeline registers what the scene references and bakes it
//! 4. Every enabled camera draws its visible layers, then the post pass runs
//! 5. The frame is presented

use std::{path::PathBuf, pin::Pin, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    context::Context,
    data_structures::scene_graph::Scene,
    input::InputHandlers,
    pipelines::WgpuBackend,
    render::{
        backend::{BackendError, GpuBackend},
        pipeline::{FrameStats, RenderPipeline, RenderSettings},
    },
    resources::Assets,
};

/// Timing of the frame being processed. Times are in seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameContext {
    /// Time since the previous frame.
    pub delta: f32,
    /// Time since the clock started.
    pub elapsed: f32,
    pub frame: u64,
}

impl FrameContext {
    pub fn new(delta: f32, elapsed: f32, frame: u64) -> Self {
        Self {
            delta,
            elapsed,
            frame,
        }
    }
}

#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame: 0,
        }
    }

    /// Advances to the next frame.
    pub fn tick(&mut self) -> FrameContext {
        let now = Instant::now();
        let context = FrameContext {
            delta: (now - self.last).as_secs_f32(),
            elapsed: (now - self.start).as_secs_f32(),
            frame: self.frame,
        };
        self.last = now;
        self.frame += 1;
        context
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Textures, meshes and `shaders/` live below this directory.
    pub assets_root: PathBuf,
    /// Fragment shader id under `shaders/post/`.
    pub post_process: Option<String>,
    pub clear_color: [f32; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "reef-ngin".to_string(),
            width: 1280,
            height: 720,
            assets_root: PathBuf::from("assets"),
            post_process: None,
            clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

impl EngineConfig {
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_assets_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets_root = root.into();
        self
    }

    pub fn with_post_process(mut self, shader: &str) -> Self {
        self.post_process = Some(shader.to_string());
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            shader_root: self.assets_root.join("shaders"),
            post_process: self.post_process.clone(),
            width: self.width,
            height: self.height,
            clear_color: self.clear_color,
            ..RenderSettings::default()
        }
    }
}

/// Scene, pipeline and input of a running application.
#[derive(Debug)]
pub struct Engine {
    pub scene: Scene,
    pub pipeline: RenderPipeline,
    pub input: InputHandlers,
    started: bool,
}

impl Engine {
    pub fn new(scene: Scene, pipeline: RenderPipeline) -> Self {
        Self {
            scene,
            pipeline,
            input: InputHandlers::new(),
            started: false,
        }
    }

    pub fn with_input(mut self, input: InputHandlers) -> Self {
        self.input = input;
        self
    }

    /// Runs every component's `start` once. Later calls do nothing.
    pub fn start(&mut self, frame: &FrameContext) {
        if self.started {
            return;
        }
        self.scene.start(frame);
        self.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Update, bake and draw one frame. Starts the scene first if needed.
    pub fn run_frame(
        &mut self,
        frame: &FrameContext,
        backend: &mut dyn GpuBackend,
    ) -> Result<FrameStats, BackendError> {
        self.start(frame);
        self.scene.update(frame);
        self.pipeline.prepare(&self.scene);
        self.pipeline.bake(backend);
        self.pipeline.draw(&self.scene, frame, backend)
    }

    /// Resizes the viewport and fits every camera's aspect ratio to it.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.pipeline.resize(width, height);
        let aspect = width as f32 / height as f32;
        for object in self.scene.objects_mut() {
            for component in object.components_mut() {
                if let Some(camera) = component.camera_mut() {
                    camera.set_aspect(aspect);
                }
            }
        }
    }
}

/// What a scene constructor gets to work with while building the scene.
#[derive(Debug)]
pub struct SceneContext {
    pub assets: Assets,
    pub input: InputHandlers,
    pub config: EngineConfig,
}

pub type SceneConstructor = Box<
    dyn FnOnce(SceneContext) -> Pin<Box<dyn Future<Output = anyhow::Result<(Scene, SceneContext)>>>>,
>;

struct AppState {
    ctx: Context,
    backend: WgpuBackend,
    engine: Engine,
    clock: FrameClock,
}

impl AppState {
    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        self.engine.resize(width, height);
    }

    fn render(&mut self) {
        self.ctx.window.request_redraw();
        let output = match self.ctx.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = self.ctx.size();
                self.resize(width, height);
                return;
            }
            Err(e) => {
                log::error!("Unable to render {}", e);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.backend.set_screen(view, self.ctx.depth_view().clone());

        let frame = self.clock.tick();
        match self.engine.run_frame(&frame, &mut self.backend) {
            Ok(stats) => log::trace!("Frame {}: {:?}", frame.frame, stats),
            Err(e) => log::error!("Frame {} failed: {}", frame.frame, e),
        }
        output.present();
    }
}

struct App {
    async_runtime: tokio::runtime::Runtime,
    config: EngineConfig,
    constructor: Option<SceneConstructor>,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: EngineConfig, constructor: SceneConstructor) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            constructor: Some(constructor),
            state: None,
            error: None,
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let constructor = self
            .constructor
            .take()
            .ok_or_else(|| anyhow::anyhow!("the scene was already constructed"))?;
        let config = self.config.clone();

        let init_future = async move {
            let ctx = Context::new(window).await?;
            let scene_ctx = SceneContext {
                assets: Assets::new(config.assets_root.clone()),
                input: InputHandlers::new(),
                config: config.clone(),
            };
            let (scene, scene_ctx) = constructor(scene_ctx).await?;
            anyhow::Ok((ctx, scene, scene_ctx))
        };
        let (ctx, scene, scene_ctx) = self.async_runtime.block_on(init_future)?;
        log::info!("Scene constructed:\n{}", scene);

        // The clone leverages the internal Arcs of Device and Queue and thus only clones the ref
        let backend = WgpuBackend::new(ctx.device.clone(), ctx.queue.clone(), ctx.config.format);
        let (width, height) = ctx.size();
        let mut settings = scene_ctx.config.render_settings();
        settings.width = width;
        settings.height = height;
        let mut engine =
            Engine::new(scene, RenderPipeline::new(settings)).with_input(scene_ctx.input);
        engine.resize(width, height);
        Ok(AppState {
            ctx,
            backend,
            engine,
            clock: FrameClock::new(),
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => {
                state.ctx.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                log::error!("App initialization failed: {:?}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        state.engine.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                let quit = matches!(
                    event.physical_key,
                    PhysicalKey::Code(KeyCode::Escape | KeyCode::KeyQ)
                );
                if quit && event.state == ElementState::Pressed {
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => state.render(),
            _ => {}
        }
    }
}

/// Opens a window, builds the scene with `constructor` and renders until the
/// window is closed.
pub fn run(config: EngineConfig, constructor: SceneConstructor) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, constructor)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_counts_frames() {
        let mut clock = FrameClock::new();
        let first = clock.tick();
        let second = clock.tick();
        assert_eq!(first.frame, 0);
        assert_eq!(second.frame, 1);
        assert!(second.elapsed >= first.elapsed);
        assert!(second.delta >= 0.0);
    }

    #[test]
    fn config_feeds_render_settings() {
        let config = EngineConfig::default()
            .with_size(640, 480)
            .with_assets_root("data")
            .with_post_process("grayscale");
        let settings = config.render_settings();
        assert_eq!((settings.width, settings.height), (640, 480));
        assert_eq!(settings.shader_root, PathBuf::from("data").join("shaders"));
        assert_eq!(settings.post_process.as_deref(), Some("grayscale"));
    }
}
