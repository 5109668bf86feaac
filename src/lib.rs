//! reef-ngin
//!
//! A small single-threaded 3D scene runtime. Scenes are ordered lists of
//! objects carrying a transform and components; every frame the engine runs
//! animators and behaviours in scene order and then submits the scene to the
//! GPU through an ordered, lazily baked render pipeline.
//!
//! High-level modules
//! - `math`: cgmath aliases and the left-handed conventions used throughout
//! - `data_structures`: transforms, scene graph, animation, meshes, materials
//! - `render`: registries, the backend interface and the submission pipeline
//! - `pipelines`: the wgpu implementation of the backend interface
//! - `resources`: loaders for textures, cube maps, OBJ and glTF files
//! - `context`: window surface, device and queue
//! - `flow`: frame clock, engine and the winit application loop
//! - `input` and `behaviours`: input fan-out and ready-made behaviours
//!

pub mod behaviours;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod input;
pub mod math;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use winit::event::WindowEvent;
pub use winit::keyboard::KeyCode;

pub use data_structures::{
    animation::{Animation, Animator, Channel, KeyFrames},
    camera::Camera,
    layer::Layers,
    material::{Material, PropertyBlock},
    mesh::Mesh,
    renderer::MeshRenderer,
    scene_graph::{Behaviour, BehaviourContext, Component, Scene, SceneObject},
    texture::Texture,
    transform::Transform,
};
pub use flow::{Engine, EngineConfig, FrameContext, SceneConstructor, SceneContext, run};
pub use render::pipeline::{RenderPipeline, RenderSettings};
