//! Render submission.
//!
//! [`backend`] is the GPU interface, [`registry`] turns materials and
//! textures into backend handles, and [`pipeline`] walks the scene each
//! frame and issues the draw calls.

pub mod backend;
pub mod pipeline;
pub mod registry;
