//! Materials and per-renderer property blocks.

use std::{
    collections::BTreeMap,
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::{data_structures::texture::Texture, math::Vec3};

pub const DEFAULT_ORDER_IN_QUEUE: i32 = 1000;

/// Tessellation control and evaluation shader ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tessellation {
    pub control: String,
    pub evaluation: String,
}

/// The shader sources a compiled program is built from.
///
/// Materials with equal keys share one program.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderKey {
    pub vertex: String,
    pub fragment: String,
    pub tessellation: Option<Tessellation>,
}

/// Shader ids plus the fixed-function flags a draw needs.
///
/// Materials are identified by name: two materials with the same name are
/// interchangeable for batching and baking.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
    pub tessellation: Option<Tessellation>,
    pub render_both_faces: bool,
    pub order_in_queue: i32,
}

impl Material {
    pub fn new(name: &str, vertex: &str, fragment: &str) -> Self {
        Self {
            name: name.to_string(),
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
            tessellation: None,
            render_both_faces: false,
            order_in_queue: DEFAULT_ORDER_IN_QUEUE,
        }
    }

    pub fn with_tessellation(mut self, control: &str, evaluation: &str) -> Self {
        self.tessellation = Some(Tessellation {
            control: control.to_string(),
            evaluation: evaluation.to_string(),
        });
        self
    }

    pub fn with_both_faces(mut self, render_both_faces: bool) -> Self {
        self.render_both_faces = render_both_faces;
        self
    }

    pub fn with_order(mut self, order_in_queue: i32) -> Self {
        self.order_in_queue = order_in_queue;
        self
    }

    pub fn is_tessellated(&self) -> bool {
        self.tessellation.is_some()
    }

    pub fn shader_key(&self) -> ShaderKey {
        ShaderKey {
            vertex: self.vertex.clone(),
            fragment: self.fragment.clone(),
            tessellation: self.tessellation.clone(),
        }
    }
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Material {}

impl Hash for Material {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[derive(Clone, Debug)]
pub enum PropertyValue {
    Float(f32),
    Int(i32),
    Vector3(Vec3),
    Texture(Rc<Texture>),
}

/// Named uniform values attached to one renderer.
///
/// Entries iterate in lexical name order. Texture units are handed out in
/// that same order starting at zero.
#[derive(Clone, Debug, Default)]
pub struct PropertyBlock {
    values: BTreeMap<String, PropertyValue>,
}

impl PropertyBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.values.insert(name.to_string(), PropertyValue::Float(value));
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.values.insert(name.to_string(), PropertyValue::Int(value));
    }

    pub fn set_vector3(&mut self, name: &str, value: Vec3) {
        self.values.insert(name.to_string(), PropertyValue::Vector3(value));
    }

    pub fn set_texture(&mut self, name: &str, texture: Rc<Texture>) {
        self.values.insert(name.to_string(), PropertyValue::Texture(texture));
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(PropertyValue::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        match self.values.get(name) {
            Some(PropertyValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_vector3(&self, name: &str) -> Option<Vec3> {
        match self.values.get(name) {
            Some(PropertyValue::Vector3(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_texture(&self, name: &str) -> Option<&Rc<Texture>> {
        match self.values.get(name) {
            Some(PropertyValue::Texture(texture)) => Some(texture),
            _ => None,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.values.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Textures in unit order.
    pub fn textures(&self) -> impl Iterator<Item = (&str, &Rc<Texture>)> {
        self.iter().filter_map(|(name, value)| match value {
            PropertyValue::Texture(texture) => Some((name, texture)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
