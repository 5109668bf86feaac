//! Perspective camera component.

use std::{cell::Cell, rc::Rc};

use crate::{
    data_structures::{layer::Layers, texture::Texture},
    math::{self, Mat4},
};

#[derive(Clone, Debug)]
pub struct Camera {
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    projection: Cell<Option<Mat4>>,
    /// Layers this camera draws.
    pub rendering_layers: Layers,
    pub skybox: Option<Rc<Texture>>,
    pub clear_color: [f32; 4],
    pub enabled: bool,
}

impl Camera {
    /// `fov` is the vertical field of view in degrees.
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            aspect,
            near,
            far,
            projection: Cell::new(None),
            rendering_layers: Layers::ALL,
            skybox: None,
            clear_color: [0.1, 0.1, 0.1, 1.0],
            enabled: true,
        }
    }

    pub fn with_layers(mut self, layers: Layers) -> Self {
        self.rendering_layers = layers;
        self
    }

    pub fn attach_skybox(&mut self, cubemap: Rc<Texture>) {
        if !cubemap.is_cubemap() {
            log::warn!(
                "Texture {} is not a cube map and cannot be used as a sky box.",
                cubemap.location()
            );
            return;
        }
        self.skybox = Some(cubemap);
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
        self.projection.set(None);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection.set(None);
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.projection.set(None);
    }

    /// The projection matrix, rebuilt only after a parameter changed.
    pub fn projection(&self) -> Mat4 {
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        let projection = math::perspective(self.fov, self.aspect, self.near, self.far);
        self.projection.set(Some(projection));
        projection
    }

    pub fn sees(&self, layers: Layers) -> bool {
        self.rendering_layers.intersects(layers)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(60.0, 16.0 / 9.0, 0.3, 1000.0)
    }
}
