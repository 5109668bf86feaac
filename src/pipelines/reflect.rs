//! WGSL validation and binding reflection.
//!
//! Programs are plain WGSL files. Group 0 binding 0 is an optional uniform
//! struct whose members are addressed by name through `set_uniform`. Group 1
//! holds textures, each followed by its sampler at the next binding.

use std::collections::{BTreeMap, HashMap};

use naga::{
    AddressSpace, ImageClass, ImageDimension, ScalarKind, TypeInner, VectorSize,
    valid::{Capabilities, ValidationFlags, Validator},
};

use crate::{pipelines::texture::TextureKind, render::backend::UniformValue};

/// Largest uniform struct a program may declare.
pub const MAX_UNIFORM_SIZE: u32 = 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemberType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Other,
}

impl MemberType {
    fn of(inner: &TypeInner) -> Self {
        match inner {
            TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
                ScalarKind::Float => MemberType::Float,
                ScalarKind::Sint => MemberType::Int,
                _ => MemberType::Other,
            },
            TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
                VectorSize::Bi => MemberType::Vec2,
                VectorSize::Tri => MemberType::Vec3,
                VectorSize::Quad => MemberType::Vec4,
            },
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                ..
            } => MemberType::Mat4,
            _ => MemberType::Other,
        }
    }

    /// Whether `value` can be written into a member of this type.
    pub fn accepts(&self, value: &UniformValue) -> bool {
        matches!(
            (self, value),
            (MemberType::Float, UniformValue::Float(_))
                | (MemberType::Int, UniformValue::Int(_))
                | (MemberType::Vec2, UniformValue::Vec2(_))
                | (MemberType::Vec3, UniformValue::Vec3(_))
                | (MemberType::Vec4, UniformValue::Vec3(_))
                | (MemberType::Mat4, UniformValue::Mat4(_))
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UniformMember {
    pub offset: u32,
    pub ty: MemberType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: String,
    pub binding: u32,
    pub kind: TextureKind,
    /// Binding of the sampler paired with this texture, if declared.
    pub sampler: Option<u32>,
}

/// What a vertex/fragment pair expects to be bound.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramLayout {
    pub uniform_size: u32,
    pub members: HashMap<String, UniformMember>,
    /// Sorted by binding; the index is the texture unit.
    pub textures: Vec<TextureSlot>,
}

impl ProgramLayout {
    pub fn has_uniforms(&self) -> bool {
        self.uniform_size > 0
    }

    /// Slot addressed by `name`, or by `unit` when no slot carries the name.
    pub fn texture_slot(&self, unit: u32, name: &str) -> Option<usize> {
        self.textures
            .iter()
            .position(|slot| slot.name == name)
            .or_else(|| ((unit as usize) < self.textures.len()).then_some(unit as usize))
    }

    fn merge(&mut self, other: ProgramLayout) -> Result<(), String> {
        self.uniform_size = self.uniform_size.max(other.uniform_size);
        for (name, member) in other.members {
            match self.members.get(&name) {
                Some(existing) if *existing != member => {
                    return Err(format!("uniform {} is declared differently per stage", name));
                }
                _ => {
                    self.members.insert(name, member);
                }
            }
        }
        let mut textures: BTreeMap<u32, TextureSlot> = self
            .textures
            .drain(..)
            .map(|slot| (slot.binding, slot))
            .collect();
        for slot in other.textures {
            match textures.get(&slot.binding) {
                Some(existing) if existing.kind != slot.kind => {
                    return Err(format!("texture {} is declared differently per stage", slot.name));
                }
                _ => {
                    textures.insert(slot.binding, slot);
                }
            }
        }
        self.textures = textures.into_values().collect();
        Ok(())
    }
}

/// Parses and validates one stage and checks that it exports `entry_point`.
pub fn validate_stage(
    source: &str,
    stage: naga::ShaderStage,
    entry_point: &str,
) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| format!("{}", e))?;
    if !module
        .entry_points
        .iter()
        .any(|entry| entry.stage == stage && entry.name == entry_point)
    {
        return Err(format!("no {:?} entry point named {}", stage, entry_point));
    }
    Ok(module)
}

/// Reflects the bindings of one stage.
pub fn reflect(module: &naga::Module) -> Result<ProgramLayout, String> {
    let mut layout = ProgramLayout::default();
    let mut samplers: HashMap<u32, bool> = HashMap::new();
    let mut textures = Vec::new();

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let name = global.name.clone().unwrap_or_default();
        let inner = &module.types[global.ty].inner;
        match (binding.group, binding.binding) {
            (0, 0) => {
                if global.space != AddressSpace::Uniform {
                    return Err("group 0 binding 0 must be a uniform buffer".to_string());
                }
                let TypeInner::Struct { members, span } = inner else {
                    return Err("the uniform block must be a struct".to_string());
                };
                if *span > MAX_UNIFORM_SIZE {
                    return Err(format!(
                        "the uniform block takes {} bytes, at most {} are supported",
                        span, MAX_UNIFORM_SIZE
                    ));
                }
                layout.uniform_size = *span;
                for member in members {
                    if let Some(member_name) = &member.name {
                        layout.members.insert(
                            member_name.clone(),
                            UniformMember {
                                offset: member.offset,
                                ty: MemberType::of(&module.types[member.ty].inner),
                            },
                        );
                    }
                }
            }
            (1, slot) => match inner {
                TypeInner::Image {
                    dim,
                    arrayed: false,
                    class,
                } => {
                    let kind = match (dim, class) {
                        (ImageDimension::D2, ImageClass::Sampled { multi: false, .. }) => {
                            TextureKind::D2
                        }
                        (ImageDimension::Cube, ImageClass::Sampled { multi: false, .. }) => {
                            TextureKind::Cube
                        }
                        (ImageDimension::D2, ImageClass::Depth { multi: false }) => {
                            TextureKind::Depth
                        }
                        _ => return Err(format!("texture {} has an unsupported type", name)),
                    };
                    textures.push(TextureSlot {
                        name,
                        binding: slot,
                        kind,
                        sampler: None,
                    });
                }
                TypeInner::Sampler { comparison } => {
                    samplers.insert(slot, *comparison);
                }
                _ => return Err(format!("{} in group 1 is neither texture nor sampler", name)),
            },
            (group, slot) => {
                return Err(format!("binding {}:{} ({}) is not supported", group, slot, name));
            }
        }
    }

    for texture in textures.iter_mut() {
        if let Some(comparison) = samplers.remove(&(texture.binding + 1)) {
            if comparison {
                return Err(format!("comparison sampler for {} is not supported", texture.name));
            }
            texture.sampler = Some(texture.binding + 1);
        }
    }
    if let Some(binding) = samplers.keys().next() {
        return Err(format!("sampler at binding {} follows no texture", binding));
    }
    textures.sort_by_key(|slot| slot.binding);
    layout.textures = textures;
    Ok(layout)
}

/// Validates both stages and merges their bindings.
pub fn reflect_program(vertex: &str, fragment: &str) -> Result<ProgramLayout, String> {
    let vertex_module = validate_stage(vertex, naga::ShaderStage::Vertex, "vs_main")
        .map_err(|e| format!("vertex stage: {}", e))?;
    let fragment_module = validate_stage(fragment, naga::ShaderStage::Fragment, "fs_main")
        .map_err(|e| format!("fragment stage: {}", e))?;
    let mut layout = reflect(&vertex_module)?;
    layout.merge(reflect(&fragment_module)?)?;
    Ok(layout)
}

/// Little endian bytes of `value` as laid out in a WGSL uniform block.
pub fn uniform_bytes(value: &UniformValue) -> Vec<u8> {
    match value {
        UniformValue::Float(v) => bytemuck::bytes_of(v).to_vec(),
        UniformValue::Int(v) => bytemuck::bytes_of(v).to_vec(),
        UniformValue::Vec2(v) => bytemuck::cast_slice(&[v.x, v.y]).to_vec(),
        UniformValue::Vec3(v) => bytemuck::cast_slice(&[v.x, v.y, v.z]).to_vec(),
        UniformValue::Mat4(m) => {
            let columns: [[f32; 4]; 4] = (*m).into();
            bytemuck::cast_slice(&columns).to_vec()
        }
    }
}
