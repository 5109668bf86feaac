//! Scene graph and per-frame dispatch.
//!
//! A [`Scene`] owns an ordered list of [`SceneObject`]s and every object owns
//! its [`Transform`] and an ordered list of [`Component`]s. `start` and
//! `update` walk objects and components in insertion order; that order is
//! the only update-ordering contract, so a component sees the mutations of
//! everything before it in the same frame.

use std::{
    any::Any,
    collections::HashMap,
    fmt::{Debug, Display},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    data_structures::{
        animation::Animator, camera::Camera, layer::Layers, renderer::MeshRenderer,
        transform::Transform,
    },
    flow::FrameContext,
};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-frame logic attached to a scene object.
///
/// Both callbacks default to doing nothing.
pub trait Behaviour: Any {
    fn start(&mut self, _ctx: &mut BehaviourContext<'_>) {}

    fn update(&mut self, _ctx: &mut BehaviourContext<'_>) {}

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/**
 * What a behaviour gets to see while its callback runs: the frame clock,
 * its object's transform, name and layer, and the sibling components that
 * come before and after it.
 */
pub struct BehaviourContext<'a> {
    pub frame: &'a FrameContext,
    pub transform: &'a Transform,
    pub name: &'a str,
    pub layer: Layers,
    before: &'a mut [Component],
    after: &'a mut [Component],
}

impl<'a> BehaviourContext<'a> {
    /// First sibling of `kind`, searching in component order.
    pub fn sibling(&mut self, kind: ComponentKind) -> Option<&mut Component> {
        self.siblings_mut().find(|component| component.kind() == kind)
    }

    pub fn siblings_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.before.iter_mut().chain(self.after.iter_mut())
    }

    pub fn sibling_animator(&mut self) -> Option<&mut Animator> {
        self.siblings_mut().find_map(|component| component.animator_mut())
    }

    pub fn sibling_renderer(&mut self) -> Option<&mut MeshRenderer> {
        self.siblings_mut().find_map(|component| component.renderer_mut())
    }

    pub fn sibling_camera(&mut self) -> Option<&mut Camera> {
        self.siblings_mut().find_map(|component| component.camera_mut())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Camera,
    Renderer,
    Animator,
    Behaviour,
}

pub enum ComponentData {
    Camera(Camera),
    Renderer(MeshRenderer),
    Animator(Animator),
    Behaviour(Box<dyn Behaviour>),
}

/// A component and the object that owns it, if any.
pub struct Component {
    owner: Option<ObjectId>,
    data: ComponentData,
}

impl Component {
    pub fn new(data: ComponentData) -> Self {
        Self { owner: None, data }
    }

    pub fn camera(camera: Camera) -> Self {
        Self::new(ComponentData::Camera(camera))
    }

    pub fn renderer(renderer: MeshRenderer) -> Self {
        Self::new(ComponentData::Renderer(renderer))
    }

    pub fn animator(animator: Animator) -> Self {
        Self::new(ComponentData::Animator(animator))
    }

    pub fn behaviour(behaviour: impl Behaviour) -> Self {
        Self::new(ComponentData::Behaviour(Box::new(behaviour)))
    }

    pub fn owner(&self) -> Option<ObjectId> {
        self.owner
    }

    pub fn kind(&self) -> ComponentKind {
        match self.data {
            ComponentData::Camera(_) => ComponentKind::Camera,
            ComponentData::Renderer(_) => ComponentKind::Renderer,
            ComponentData::Animator(_) => ComponentKind::Animator,
            ComponentData::Behaviour(_) => ComponentKind::Behaviour,
        }
    }

    pub fn data(&self) -> &ComponentData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ComponentData {
        &mut self.data
    }

    /// A detached duplicate that can be added to another object.
    ///
    /// Renderer copies share mesh, material and textures but get their own
    /// property block. Behaviours cannot be copied.
    pub fn copy(&self) -> Option<Component> {
        self.duplicate().map(Component::new)
    }

    /// A duplicate that still records the original owner. Adding it to an
    /// object is rejected.
    pub fn shallow_clone(&self) -> Option<Component> {
        self.duplicate().map(|data| Component {
            owner: self.owner,
            data,
        })
    }

    fn duplicate(&self) -> Option<ComponentData> {
        match &self.data {
            ComponentData::Camera(camera) => Some(ComponentData::Camera(camera.clone())),
            ComponentData::Renderer(renderer) => Some(ComponentData::Renderer(renderer.clone())),
            ComponentData::Animator(animator) => Some(ComponentData::Animator(animator.clone())),
            ComponentData::Behaviour(_) => None,
        }
    }

    pub fn as_camera(&self) -> Option<&Camera> {
        match &self.data {
            ComponentData::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.data {
            ComponentData::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_renderer(&self) -> Option<&MeshRenderer> {
        match &self.data {
            ComponentData::Renderer(renderer) => Some(renderer),
            _ => None,
        }
    }

    pub fn renderer_mut(&mut self) -> Option<&mut MeshRenderer> {
        match &mut self.data {
            ComponentData::Renderer(renderer) => Some(renderer),
            _ => None,
        }
    }

    pub fn as_animator(&self) -> Option<&Animator> {
        match &self.data {
            ComponentData::Animator(animator) => Some(animator),
            _ => None,
        }
    }

    pub fn animator_mut(&mut self) -> Option<&mut Animator> {
        match &mut self.data {
            ComponentData::Animator(animator) => Some(animator),
            _ => None,
        }
    }

    pub fn as_behaviour<T: Behaviour>(&self) -> Option<&T> {
        match &self.data {
            ComponentData::Behaviour(behaviour) => {
                let any: &dyn Any = &**behaviour;
                any.downcast_ref::<T>()
            }
            _ => None,
        }
    }

    pub fn behaviour_mut<T: Behaviour>(&mut self) -> Option<&mut T> {
        match &mut self.data {
            ComponentData::Behaviour(behaviour) => {
                let any: &mut dyn Any = &mut **behaviour;
                any.downcast_mut::<T>()
            }
            _ => None,
        }
    }
}

impl From<Camera> for Component {
    fn from(camera: Camera) -> Self {
        Component::camera(camera)
    }
}

impl From<MeshRenderer> for Component {
    fn from(renderer: MeshRenderer) -> Self {
        Component::renderer(renderer)
    }
}

impl From<Animator> for Component {
    fn from(animator: Animator) -> Self {
        Component::animator(animator)
    }
}

impl Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("Component");
        out.field("owner", &self.owner);
        match &self.data {
            ComponentData::Camera(camera) => out.field("camera", camera),
            ComponentData::Renderer(renderer) => out.field("renderer", renderer),
            ComponentData::Animator(animator) => out.field("animator", animator),
            ComponentData::Behaviour(behaviour) => out.field("behaviour", &behaviour.name()),
        };
        out.finish()
    }
}

/// A named transform with components attached.
#[derive(Debug)]
pub struct SceneObject {
    id: ObjectId,
    pub name: String,
    pub layer: Layers,
    transform: Transform,
    components: Vec<Component>,
}

impl SceneObject {
    pub fn new(name: &str) -> Self {
        Self::with_transform(name, Transform::new())
    }

    pub fn with_transform(name: &str, transform: Transform) -> Self {
        let id = ObjectId::next();
        transform.set_owner(id);
        Self {
            id,
            name: name.to_string(),
            layer: Layers::default(),
            transform,
            components: Vec::new(),
        }
    }

    /// A new object whose transform is parented to `parent`.
    pub fn with_parent(name: &str, parent: &Transform) -> Self {
        let object = Self::new(name);
        // a fresh transform can never be an ancestor of `parent`
        if let Err(e) = object.transform.set_parent(Some(parent)) {
            log::error!("Could not parent {}: {}", name, e);
        }
        object
    }

    pub fn with_layer(mut self, layer: Layers) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_component(mut self, component: impl Into<Component>) -> Self {
        self.add_component(component);
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Takes ownership of `component`.
    ///
    /// Components that already belong to an object are rejected and
    /// `false` is returned.
    pub fn add_component(&mut self, component: impl Into<Component>) -> bool {
        let mut component = component.into();
        if let Some(owner) = component.owner {
            log::warn!(
                "{} tried to add a {:?} component that already belongs to {:?}.",
                self.name,
                component.kind(),
                owner
            );
            return false;
        }
        component.owner = Some(self.id);
        self.components.push(component);
        true
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [Component] {
        &mut self.components
    }

    /// First component of `kind`, in insertion order.
    pub fn get_component(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.iter().find(|c| c.kind() == kind)
    }

    pub fn get_component_mut(&mut self, kind: ComponentKind) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.kind() == kind)
    }

    /// All components whose kind is in `kinds`, in insertion order.
    pub fn get_components(&self, kinds: &[ComponentKind]) -> Vec<&Component> {
        self.components
            .iter()
            .filter(|c| kinds.contains(&c.kind()))
            .collect()
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.components.iter().find_map(Component::as_camera)
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.components.iter_mut().find_map(Component::camera_mut)
    }

    pub fn renderer(&self) -> Option<&MeshRenderer> {
        self.components.iter().find_map(Component::as_renderer)
    }

    pub fn renderer_mut(&mut self) -> Option<&mut MeshRenderer> {
        self.components.iter_mut().find_map(Component::renderer_mut)
    }

    pub fn animator(&self) -> Option<&Animator> {
        self.components.iter().find_map(Component::as_animator)
    }

    pub fn animator_mut(&mut self) -> Option<&mut Animator> {
        self.components.iter_mut().find_map(Component::animator_mut)
    }

    pub fn behaviour<T: Behaviour>(&self) -> Option<&T> {
        self.components.iter().find_map(Component::as_behaviour::<T>)
    }

    pub fn behaviour_mut<T: Behaviour>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find_map(Component::behaviour_mut::<T>)
    }

    pub fn start(&mut self, frame: &FrameContext) {
        self.dispatch(frame, Phase::Start);
    }

    pub fn update(&mut self, frame: &FrameContext) {
        self.dispatch(frame, Phase::Update);
    }

    fn dispatch(&mut self, frame: &FrameContext, phase: Phase) {
        for i in 0..self.components.len() {
            let (before, rest) = self.components.split_at_mut(i);
            let Some((current, after)) = rest.split_first_mut() else {
                break;
            };
            match &mut current.data {
                ComponentData::Animator(animator) => match phase {
                    Phase::Start => animator.start(),
                    Phase::Update => animator.update(frame),
                },
                ComponentData::Behaviour(behaviour) => {
                    let mut ctx = BehaviourContext {
                        frame,
                        transform: &self.transform,
                        name: &self.name,
                        layer: self.layer,
                        before,
                        after,
                    };
                    match phase {
                        Phase::Start => behaviour.start(&mut ctx),
                        Phase::Update => behaviour.update(&mut ctx),
                    }
                }
                ComponentData::Camera(_) | ComponentData::Renderer(_) => {}
            }
        }
    }

    fn write_tree(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        scene: &Scene,
        index: &HashMap<ObjectId, usize>,
        depth: usize,
    ) -> std::fmt::Result {
        let kinds: Vec<String> = self
            .components
            .iter()
            .map(|c| format!("{:?}", c.kind()))
            .collect();
        writeln!(
            f,
            "{}{} [{}]",
            "    ".repeat(depth),
            self.name,
            kinds.join(", ")
        )?;
        for child in self.transform.children() {
            let Some(object) = child
                .owner()
                .and_then(|id| index.get(&id))
                .map(|&i| &scene.objects[i])
            else {
                continue;
            };
            object.write_tree(f, scene, index, depth + 1)?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone)]
enum Phase {
    Start,
    Update,
}

/// Ordered collection of scene objects.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `object` and returns its id.
    pub fn add_object(&mut self, object: SceneObject) -> ObjectId {
        let id = object.id();
        self.objects.push(object);
        id
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [SceneObject] {
        &mut self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// First object named `name`, in insertion order.
    pub fn find(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn start(&mut self, frame: &FrameContext) {
        self.objects.iter_mut().for_each(|o| o.start(frame));
    }

    pub fn update(&mut self, frame: &FrameContext) {
        self.objects.iter_mut().for_each(|o| o.update(frame));
    }

    /// Every component with its owning object, in scene order.
    pub fn components(&self) -> impl Iterator<Item = (&SceneObject, &Component)> {
        self.objects
            .iter()
            .flat_map(|o| o.components.iter().map(move |c| (o, c)))
    }

    /// Every enabled renderer with its owning object, in scene order.
    pub fn renderers(&self) -> impl Iterator<Item = (&SceneObject, &MeshRenderer)> {
        self.components()
            .filter_map(|(o, c)| c.as_renderer().map(|r| (o, r)))
            .filter(|(_, r)| r.enabled)
    }

    /// Every enabled camera with its owning object, in scene order.
    pub fn cameras(&self) -> impl Iterator<Item = (&SceneObject, &Camera)> {
        self.components()
            .filter_map(|(o, c)| c.as_camera().map(|cam| (o, cam)))
            .filter(|(_, cam)| cam.enabled)
    }
}

impl Display for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index: HashMap<ObjectId, usize> = self
            .objects
            .iter()
            .enumerate()
            .map(|(i, o)| (o.id, i))
            .collect();
        for object in &self.objects {
            let parent_in_scene = object
                .transform
                .parent()
                .and_then(|p| p.owner())
                .is_some_and(|id| index.contains_key(&id));
            if !parent_in_scene {
                object.write_tree(f, self, &index, 0)?;
            }
        }
        Ok(())
    }
}
