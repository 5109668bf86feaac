//! Math aliases and helpers on top of `cgmath`.
//!
//! The engine uses a left-handed convention: `+X` is right, `+Y` is up and
//! `+Z` is forward. Projection maps view depth into `[0, 1]` which is what
//! wgpu expects for clip space.

use cgmath::{InnerSpace, Matrix4, Rad, Rotation3, SquareMatrix, Zero};

pub type Vec2 = cgmath::Vector2<f32>;
pub type Vec3 = cgmath::Vector3<f32>;
pub type Vec4 = cgmath::Vector4<f32>;
pub type Quat = cgmath::Quaternion<f32>;
pub type Mat4 = cgmath::Matrix4<f32>;

pub const RIGHT: Vec3 = Vec3::new(1.0, 0.0, 0.0);
pub const UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);
pub const FORWARD: Vec3 = Vec3::new(0.0, 0.0, 1.0);

pub fn identity() -> Mat4 {
    Mat4::identity()
}

/// `T * R * S`, the local matrix of a transform.
pub fn trs(position: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    Matrix4::from_translation(position)
        * Matrix4::from(rotation)
        * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
}

/// Rotation of `degrees` around `axis`. A zero axis yields the identity.
pub fn axis_angle(axis: Vec3, degrees: f32) -> Quat {
    if axis.magnitude2() <= f32::EPSILON {
        return Quat::new(1.0, 0.0, 0.0, 0.0);
    }
    Quat::from_axis_angle(axis.normalize(), Rad(degrees.to_radians()))
}

/// Euler angles in degrees, applied as `Rz * Ry * Rx`.
pub fn euler(x: f32, y: f32, z: f32) -> Quat {
    axis_angle(FORWARD, z) * axis_angle(UP, y) * axis_angle(RIGHT, x)
}

pub fn lerp_f32(a: &f32, b: &f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn lerp_vec3(a: &Vec3, b: &Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

/// Spherical interpolation along the shortest arc.
pub fn slerp(a: &Quat, b: &Quat, t: f32) -> Quat {
    let b = if a.dot(*b) < 0.0 { -*b } else { *b };
    a.slerp(b, t).normalize()
}

/// Left-handed perspective projection with `[0, 1]` depth.
pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_degrees.to_radians() * 0.5).tan();
    let range = far / (far - near);
    #[rustfmt::skip]
    let m = Mat4::new(
        f / aspect, 0.0, 0.0,            0.0,
        0.0,        f,   0.0,            0.0,
        0.0,        0.0, range,          1.0,
        0.0,        0.0, -near * range,  0.0,
    );
    m
}

/// Column `index` (0 = right, 1 = up, 2 = forward) of `m`, normalized.
pub fn basis_column(m: &Mat4, index: usize) -> Vec3 {
    let column = m[index].truncate();
    if column.is_zero() {
        return column;
    }
    column.normalize()
}

pub fn translation_of(m: &Mat4) -> Vec3 {
    m.w.truncate()
}
