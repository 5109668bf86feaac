//! Local TRS state with a lazily recomputed world matrix.
//!
//! A [`Transform`] is a shared handle: the owning scene object holds it and
//! children and parents only keep weak references to each other. Mutations
//! mark the local state dirty; the world matrix is recomputed on read by
//! walking up the ancestor chain and comparing each parent's revision with
//! the one recorded at the last computation, so ancestors never have to
//! push invalidations down to their children.

use std::{
    cell::RefCell,
    fmt::Debug,
    rc::{Rc, Weak},
};

use cgmath::{One, SquareMatrix};

use crate::{
    data_structures::scene_graph::ObjectId,
    math::{self, Mat4, Quat, Vec3},
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("a transform cannot be its own parent")]
    SelfParent,
    #[error("the new parent is a descendant of this transform")]
    Cycle,
}

struct TransformNode {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    parent: Option<Weak<RefCell<TransformNode>>>,
    children: Vec<Weak<RefCell<TransformNode>>>,
    dirty: bool,
    world: Mat4,
    revision: u64,
    // parent revision the cached world matrix was built from
    parent_revision: Option<u64>,
    owner: Option<ObjectId>,
}

#[derive(Clone)]
pub struct Transform(Rc<RefCell<TransformNode>>);

impl Transform {
    pub fn new() -> Self {
        Self::from_trs(Vec3::new(0.0, 0.0, 0.0), Quat::one(), Vec3::new(1.0, 1.0, 1.0))
    }

    pub fn from_trs(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self(Rc::new(RefCell::new(TransformNode {
            position,
            rotation,
            scale,
            parent: None,
            children: Vec::new(),
            dirty: true,
            world: Mat4::identity(),
            revision: 0,
            parent_revision: None,
            owner: None,
        })))
    }

    pub fn with_position(self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    pub fn with_rotation(self, rotation: Quat) -> Self {
        self.set_rotation(rotation);
        self
    }

    pub fn with_scale(self, scale: Vec3) -> Self {
        self.set_scale(scale);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.0.borrow().position
    }

    pub fn rotation(&self) -> Quat {
        self.0.borrow().rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.0.borrow().scale
    }

    pub fn set_position(&self, position: Vec3) {
        let mut node = self.0.borrow_mut();
        node.position = position;
        node.dirty = true;
    }

    pub fn set_rotation(&self, rotation: Quat) {
        let mut node = self.0.borrow_mut();
        node.rotation = rotation;
        node.dirty = true;
    }

    pub fn set_scale(&self, scale: Vec3) {
        let mut node = self.0.borrow_mut();
        node.scale = scale;
        node.dirty = true;
    }

    /// Moves the local position by `delta`.
    pub fn translate(&self, delta: Vec3) {
        let mut node = self.0.borrow_mut();
        node.position += delta;
        node.dirty = true;
    }

    /// Moves the world position by the world-space `delta`.
    pub fn translate_world(&self, delta: Vec3) {
        let local = match self.parent() {
            Some(parent) => parent
                .world_matrix()
                .invert()
                .map(|inverse| (inverse * delta.extend(0.0)).truncate())
                .unwrap_or(delta),
            None => delta,
        };
        self.translate(local);
    }

    /// Applies `delta` before the current rotation: `rotation = delta * rotation`.
    pub fn rotate(&self, delta: Quat) {
        let mut node = self.0.borrow_mut();
        node.rotation = delta * node.rotation;
        node.dirty = true;
    }

    pub fn local_matrix(&self) -> Mat4 {
        let node = self.0.borrow();
        math::trs(node.position, node.rotation, node.scale)
    }

    /// `parent.world_matrix() * local_matrix()`, or the local matrix for roots.
    ///
    /// Repeated reads without intervening mutations return the cached matrix
    /// and leave [`revision`](Self::revision) untouched.
    pub fn world_matrix(&self) -> Mat4 {
        self.resolve().0
    }

    fn resolve(&self) -> (Mat4, u64) {
        let parent = self.parent().map(|parent| parent.resolve());
        let mut node = self.0.borrow_mut();
        let parent_revision = parent.map(|(_, revision)| revision);
        if node.dirty || node.parent_revision != parent_revision {
            let local = math::trs(node.position, node.rotation, node.scale);
            node.world = match parent {
                Some((parent_world, _)) => parent_world * local,
                None => local,
            };
            node.parent_revision = parent_revision;
            node.dirty = false;
            node.revision += 1;
        }
        (node.world, node.revision)
    }

    /// Number of times the world matrix has been recomputed.
    pub fn revision(&self) -> u64 {
        self.0.borrow().revision
    }

    pub fn world_position(&self) -> Vec3 {
        math::translation_of(&self.world_matrix())
    }

    pub fn right(&self) -> Vec3 {
        math::basis_column(&self.world_matrix(), 0)
    }

    pub fn up(&self) -> Vec3 {
        math::basis_column(&self.world_matrix(), 1)
    }

    pub fn forward(&self) -> Vec3 {
        math::basis_column(&self.world_matrix(), 2)
    }

    pub fn parent(&self) -> Option<Transform> {
        self.0
            .borrow()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Transform)
    }

    pub fn children(&self) -> Vec<Transform> {
        self.0
            .borrow()
            .children
            .iter()
            .filter_map(Weak::upgrade)
            .map(Transform)
            .collect()
    }

    /// Re-parents this transform, or detaches it with `None`.
    ///
    /// The transform is removed from its former parent's children and
    /// appended to the new parent's children.
    pub fn set_parent(&self, parent: Option<&Transform>) -> Result<(), TransformError> {
        if let Some(parent) = parent {
            if self.ptr_eq(parent) {
                return Err(TransformError::SelfParent);
            }
            let mut ancestor = parent.parent();
            while let Some(current) = ancestor {
                if current.ptr_eq(self) {
                    return Err(TransformError::Cycle);
                }
                ancestor = current.parent();
            }
        }

        if let Some(old) = self.parent() {
            let me = Rc::as_ptr(&self.0);
            old.0
                .borrow_mut()
                .children
                .retain(|child| child.as_ptr() != me);
        }
        if let Some(parent) = parent {
            parent.0.borrow_mut().children.push(Rc::downgrade(&self.0));
        }
        let mut node = self.0.borrow_mut();
        node.parent = parent.map(|parent| Rc::downgrade(&parent.0));
        node.dirty = true;
        Ok(())
    }

    pub fn add_child(&self, child: &Transform) -> Result<(), TransformError> {
        child.set_parent(Some(self))
    }

    pub fn ptr_eq(&self, other: &Transform) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn owner(&self) -> Option<ObjectId> {
        self.0.borrow().owner
    }

    pub(crate) fn set_owner(&self, owner: ObjectId) {
        self.0.borrow_mut().owner = Some(owner);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.0.borrow();
        f.debug_struct("Transform")
            .field("position", &node.position)
            .field("rotation", &node.rotation)
            .field("scale", &node.scale)
            .field("owner", &node.owner)
            .field("children", &node.children.len())
            .finish()
    }
}
