use std::rc::Rc;

use crate::data_structures::{
    material::{Material, PropertyBlock},
    mesh::Mesh,
};

/// Draws one mesh with one material.
///
/// Mesh and material are shared; the property block belongs to this
/// renderer alone, so copies can diverge in their uniform values.
#[derive(Clone, Debug)]
pub struct MeshRenderer {
    pub mesh: Rc<Mesh>,
    pub material: Rc<Material>,
    pub properties: PropertyBlock,
    pub enabled: bool,
}

impl MeshRenderer {
    pub fn new(mesh: Rc<Mesh>, material: Rc<Material>) -> Self {
        Self {
            mesh,
            material,
            properties: PropertyBlock::new(),
            enabled: true,
        }
    }

    pub fn with_properties(mut self, properties: PropertyBlock) -> Self {
        self.properties = properties;
        self
    }
}
