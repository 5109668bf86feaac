use approx::assert_relative_eq;
use reef_ngin::{
    cgmath::{InnerSpace, Matrix4, One, SquareMatrix},
    data_structures::transform::{Transform, TransformError},
    math::{self, Quat, Vec3},
};

fn assert_matrix_eq(a: Matrix4<f32>, b: Matrix4<f32>) {
    let a: &[f32; 16] = a.as_ref();
    let b: &[f32; 16] = b.as_ref();
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(x, y, epsilon = 1e-4);
    }
}

fn chain() -> (Transform, Transform, Transform) {
    let root = Transform::new()
        .with_position(Vec3::new(1.0, 2.0, 3.0))
        .with_rotation(math::euler(0.0, 90.0, 0.0));
    let middle = Transform::new()
        .with_position(Vec3::new(0.0, 0.0, 5.0))
        .with_scale(Vec3::new(2.0, 2.0, 2.0));
    let leaf = Transform::new()
        .with_position(Vec3::new(1.0, 0.0, 0.0))
        .with_rotation(math::euler(30.0, 0.0, 10.0));
    middle.set_parent(Some(&root)).unwrap();
    leaf.set_parent(Some(&middle)).unwrap();
    (root, middle, leaf)
}

#[test]
fn root_world_matrix_is_local_matrix() {
    let t = Transform::new()
        .with_position(Vec3::new(4.0, -1.0, 2.0))
        .with_rotation(math::axis_angle(math::UP, 45.0))
        .with_scale(Vec3::new(1.0, 3.0, 1.0));
    assert_matrix_eq(t.world_matrix(), t.local_matrix());
}

#[test]
fn world_matrix_composes_ancestors() {
    let (root, middle, leaf) = chain();
    let expected = root.local_matrix() * middle.local_matrix() * leaf.local_matrix();
    assert_matrix_eq(leaf.world_matrix(), expected);
    assert_matrix_eq(leaf.world_matrix(), middle.world_matrix() * leaf.local_matrix());
}

#[test]
fn invariant_holds_after_mutations() {
    let (root, middle, leaf) = chain();
    let _ = leaf.world_matrix();
    root.translate(Vec3::new(0.0, 1.0, 0.0));
    middle.rotate(math::axis_angle(math::RIGHT, 20.0));
    leaf.set_scale(Vec3::new(0.5, 0.5, 0.5));
    root.set_rotation(math::euler(10.0, 20.0, 30.0));
    let expected = root.local_matrix() * middle.local_matrix() * leaf.local_matrix();
    assert_matrix_eq(leaf.world_matrix(), expected);
}

#[test]
fn ancestor_change_reaches_untouched_descendant() {
    let (root, _, leaf) = chain();
    let before = leaf.world_position();
    root.translate(Vec3::new(10.0, 0.0, 0.0));
    let after = leaf.world_position();
    assert_relative_eq!(after.x - before.x, 10.0, epsilon = 1e-4);
    assert_relative_eq!(after.y, before.y, epsilon = 1e-4);
    assert_relative_eq!(after.z, before.z, epsilon = 1e-4);
}

#[test]
fn repeated_reads_do_not_recompute() {
    let (_, _, leaf) = chain();
    let first = leaf.world_matrix();
    let revision = leaf.revision();
    let second = leaf.world_matrix();
    assert_eq!(first, second);
    assert_eq!(leaf.revision(), revision);

    leaf.set_position(Vec3::new(0.0, 0.0, 0.0));
    let _ = leaf.world_matrix();
    assert_eq!(leaf.revision(), revision + 1);
}

#[test]
fn parent_change_triggers_one_recompute() {
    let (root, _, leaf) = chain();
    let _ = leaf.world_matrix();
    let revision = leaf.revision();
    root.set_scale(Vec3::new(2.0, 2.0, 2.0));
    let _ = leaf.world_matrix();
    let _ = leaf.world_matrix();
    assert_eq!(leaf.revision(), revision + 1);
}

#[test]
fn rotate_applies_delta_before_existing_rotation() {
    let t = Transform::new().with_rotation(math::axis_angle(math::RIGHT, 30.0));
    let delta = math::axis_angle(math::UP, 90.0);
    let expected = delta * t.rotation();
    t.rotate(delta);
    let actual = t.rotation();
    assert_relative_eq!(actual.s, expected.s, epsilon = 1e-5);
    assert_relative_eq!(actual.v.x, expected.v.x, epsilon = 1e-5);
    assert_relative_eq!(actual.v.y, expected.v.y, epsilon = 1e-5);
    assert_relative_eq!(actual.v.z, expected.v.z, epsilon = 1e-5);
}

#[test]
fn basis_vectors_follow_rotation() {
    let t = Transform::new()
        .with_rotation(math::axis_angle(math::UP, 90.0))
        .with_scale(Vec3::new(3.0, 3.0, 3.0));
    // left-handed: yawing +90 degrees turns forward (+Z) into +X
    let forward = t.forward();
    assert_relative_eq!(forward.x, 1.0, epsilon = 1e-5);
    assert_relative_eq!(forward.z, 0.0, epsilon = 1e-5);
    let right = t.right();
    assert_relative_eq!(right.z, -1.0, epsilon = 1e-5);
    let up = t.up();
    assert_relative_eq!(up.y, 1.0, epsilon = 1e-5);
}

#[test]
fn reparenting_moves_between_child_lists() {
    let a = Transform::new();
    let b = Transform::new();
    let child = Transform::new();
    a.add_child(&child).unwrap();
    assert_eq!(a.children().len(), 1);

    child.set_parent(Some(&b)).unwrap();
    assert!(a.children().is_empty());
    assert_eq!(b.children().len(), 1);
    assert!(child.parent().unwrap().ptr_eq(&b));

    child.set_parent(None).unwrap();
    assert!(b.children().is_empty());
    assert!(child.parent().is_none());
}

#[test]
fn cycles_are_rejected() {
    let (root, middle, leaf) = chain();
    assert_eq!(root.set_parent(Some(&root)), Err(TransformError::SelfParent));
    assert_eq!(root.set_parent(Some(&leaf)), Err(TransformError::Cycle));
    assert_eq!(middle.set_parent(Some(&leaf)), Err(TransformError::Cycle));
    assert!(root.parent().is_none());
}

#[test]
fn detached_transform_is_identity() {
    let t = Transform::new();
    assert_eq!(t.world_matrix(), Matrix4::identity());
    assert_eq!(t.rotation(), Quat::one());
}

#[test]
fn world_translation_accounts_for_the_parent() {
    let parent = Transform::new()
        .with_position(Vec3::new(3.0, 0.0, 0.0))
        .with_rotation(math::euler(0.0, 90.0, 0.0))
        .with_scale(Vec3::new(2.0, 2.0, 2.0));
    let child = Transform::new().with_position(Vec3::new(0.0, 0.0, 1.0));
    child.set_parent(Some(&parent)).unwrap();

    let before = child.world_position();
    child.translate_world(Vec3::new(0.0, 0.0, 1.0));
    let after = child.world_position();

    assert_relative_eq!(after - before, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-5);
    let local = child.position() - Vec3::new(0.0, 0.0, 1.0);
    assert_relative_eq!(local.magnitude(), 0.5, epsilon = 1e-5);
    assert_relative_eq!(local.z, 0.0, epsilon = 1e-5);
}
