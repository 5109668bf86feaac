//! Identity-keyed registries that turn materials and textures into backend
//! handles.
//!
//! Each registry keeps a pending queue and a finalized map. `add` only
//! enqueues resources that are neither pending nor finalized; `bake` drains
//! the queue through the backend. Failures are finalized too, so nothing is
//! retried until it is explicitly invalidated.

use std::{
    collections::HashMap,
    fmt::Display,
    path::{Path, PathBuf},
    rc::Rc,
};

use log::{debug, error};

use crate::{
    data_structures::{
        material::{Material, ShaderKey},
        texture::Texture,
    },
    render::backend::{GpuBackend, ProgramHandle, ProgramSource, TextureHandle},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BakeStatus {
    Unknown,
    Pending,
    Baked,
    Failed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    TessControl,
    TessEvaluation,
}

impl ShaderStage {
    pub fn extension(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
            ShaderStage::TessControl => "tesc",
            ShaderStage::TessEvaluation => "tese",
        }
    }
}

impl Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Resolves shader ids to source text.
///
/// A shader `id` for `stage` lives at `<root>/<id>.<stage>.wgsl`. Sources are
/// read once; sources can also be registered in memory.
#[derive(Debug)]
pub struct ShaderLibrary {
    root: PathBuf,
    sources: HashMap<(ShaderStage, String), Option<Rc<str>>>,
}

impl ShaderLibrary {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            sources: HashMap::new(),
        }
    }

    pub fn insert(&mut self, stage: ShaderStage, id: &str, source: &str) {
        self.sources
            .insert((stage, id.to_string()), Some(Rc::from(source)));
    }

    pub fn path(&self, stage: ShaderStage, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}.wgsl", id, stage))
    }

    pub fn source(&mut self, stage: ShaderStage, id: &str) -> Option<Rc<str>> {
        let key = (stage, id.to_string());
        if let Some(source) = self.sources.get(&key) {
            return source.clone();
        }
        let path = self.path(stage, id);
        let source = match std::fs::read_to_string(&path) {
            Ok(text) => Some(Rc::from(text)),
            Err(e) => {
                error!("Shader {} could not be read from {:?}: {}", id, path, e);
                None
            }
        };
        self.sources.insert(key, source.clone());
        source
    }

    /// All sources of `key`, or the first stage that is missing.
    pub fn resolve(&mut self, label: &str, key: &ShaderKey) -> Result<ProgramSource, String> {
        let mut fetch = |stage: ShaderStage, id: &str| {
            self.source(stage, id)
                .map(|source| source.to_string())
                .ok_or_else(|| format!("missing {} shader {}", stage, id))
        };
        let vertex = fetch(ShaderStage::Vertex, &key.vertex)?;
        let fragment = fetch(ShaderStage::Fragment, &key.fragment)?;
        let (tess_control, tess_evaluation) = match &key.tessellation {
            Some(tess) => (
                Some(fetch(ShaderStage::TessControl, &tess.control)?),
                Some(fetch(ShaderStage::TessEvaluation, &tess.evaluation)?),
            ),
            None => (None, None),
        };
        Ok(ProgramSource {
            label: label.to_string(),
            vertex,
            fragment,
            tess_control,
            tess_evaluation,
        })
    }
}

/// Materials by name, compiled programs by shader sources.
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    pending: Vec<Rc<Material>>,
    finalized: HashMap<String, Option<ProgramHandle>>,
    programs: HashMap<ShaderKey, Option<ProgramHandle>>,
    compiles: usize,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `material` unless a material with the same name is already
    /// pending or finalized. Returns whether it was enqueued.
    pub fn add(&mut self, material: &Rc<Material>) -> bool {
        if self.finalized.contains_key(&material.name)
            || self.pending.iter().any(|m| m.name == material.name)
        {
            return false;
        }
        self.pending.push(material.clone());
        true
    }

    /// Compiles every pending material. Materials sharing shader sources share
    /// one program. Returns the number of materials finalized.
    pub fn bake(&mut self, shaders: &mut ShaderLibrary, backend: &mut dyn GpuBackend) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for material in pending {
            let key = material.shader_key();
            let program = match self.programs.get(&key) {
                Some(program) => *program,
                None => {
                    let program = self.compile(&material, &key, shaders, backend);
                    self.programs.insert(key, program);
                    program
                }
            };
            debug!(
                "Material {} baked: {}",
                material.name,
                if program.is_some() { "ok" } else { "failed" }
            );
            self.finalized.insert(material.name.clone(), program);
        }
        count
    }

    fn compile(
        &mut self,
        material: &Material,
        key: &ShaderKey,
        shaders: &mut ShaderLibrary,
        backend: &mut dyn GpuBackend,
    ) -> Option<ProgramHandle> {
        let label = format!("{} ({} / {})", material.name, key.vertex, key.fragment);
        let source = match shaders.resolve(&label, key) {
            Ok(source) => source,
            Err(e) => {
                error!("Program {} cannot be built: {}", label, e);
                return None;
            }
        };
        self.compiles += 1;
        match backend.compile_program(&source) {
            Ok(program) => Some(program),
            Err(e) => {
                error!(
                    "{}\n--- vertex source ---\n{}\n--- fragment source ---\n{}",
                    e, source.vertex, source.fragment
                );
                None
            }
        }
    }

    pub fn program(&self, name: &str) -> Option<ProgramHandle> {
        self.finalized.get(name).copied().flatten()
    }

    pub fn status(&self, name: &str) -> BakeStatus {
        match self.finalized.get(name) {
            Some(Some(_)) => BakeStatus::Baked,
            Some(None) => BakeStatus::Failed,
            None if self.pending.iter().any(|m| m.name == name) => BakeStatus::Pending,
            None => BakeStatus::Unknown,
        }
    }

    /// Forgets the bake result of `name` and of the program it used, so the
    /// next `add` compiles it again.
    pub fn invalidate(&mut self, material: &Material) {
        self.finalized.remove(&material.name);
        self.programs.remove(&material.shader_key());
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of programs compiled through the backend so far.
    pub fn compile_count(&self) -> usize {
        self.compiles
    }
}

/// Textures by source location.
#[derive(Debug, Default)]
pub struct TextureAtlas {
    pending: Vec<Rc<Texture>>,
    finalized: HashMap<String, Option<TextureHandle>>,
    uploads: usize,
}

impl TextureAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, texture: &Rc<Texture>) -> bool {
        if self.finalized.contains_key(texture.location())
            || self.pending.iter().any(|t| t.location() == texture.location())
        {
            return false;
        }
        self.pending.push(texture.clone());
        true
    }

    pub fn bake(&mut self, backend: &mut dyn GpuBackend) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for texture in pending {
            self.uploads += 1;
            let handle = match backend.upload_texture(&texture) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!("{}", e);
                    None
                }
            };
            debug!("Texture {} baked", texture.location());
            self.finalized.insert(texture.location().to_string(), handle);
        }
        count
    }

    pub fn handle(&self, location: &str) -> Option<TextureHandle> {
        self.finalized.get(location).copied().flatten()
    }

    pub fn status(&self, location: &str) -> BakeStatus {
        match self.finalized.get(location) {
            Some(Some(_)) => BakeStatus::Baked,
            Some(None) => BakeStatus::Failed,
            None if self.pending.iter().any(|t| t.location() == location) => BakeStatus::Pending,
            None => BakeStatus::Unknown,
        }
    }

    pub fn invalidate(&mut self, location: &str) {
        self.finalized.remove(location);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of uploads issued to the backend so far.
    pub fn upload_count(&self) -> usize {
        self.uploads
    }
}
