//! Engine data structures: transforms, scene graph, animation and the
//! CPU-side descriptions of meshes, materials and textures.
//!
//! - `transform` holds local TRS state and the lazily computed world matrix
//! - `scene_graph` contains scene objects, components and the scene itself
//! - `animation` contains keyframe tracks, animations and the animator
//! - `camera` and `renderer` are the built-in drawable components
//! - `mesh`, `material` and `texture` describe GPU-facing resources
//! - `layer` holds the render layer bit flags

pub mod animation;
pub mod camera;
pub mod layer;
pub mod material;
pub mod mesh;
pub mod renderer;
pub mod scene_graph;
pub mod texture;
pub mod transform;
