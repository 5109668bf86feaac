//! glTF animation import.
//!
//! Every glTF animation becomes one [`Animation`] whose channels write
//! straight into the transforms created for the animated nodes.

use std::{collections::HashMap, rc::Rc};

use gltf::animation::util::ReadOutputs;

use crate::{
    data_structures::{
        animation::{Animation, Channel, KeyFrames},
        transform::Transform,
    },
    math::{Quat, Vec3},
    resources::mesh::mirror_z,
};

/// Cubic spline samples come as (in tangent, value, out tangent) triples;
/// only the values are kept and interpolated linearly.
fn sample_values<T>(values: Vec<T>, times: usize) -> Vec<T> {
    if values.len() == times * 3 {
        values.into_iter().skip(1).step_by(3).collect()
    } else {
        values
    }
}

pub(crate) fn mirror_rotation(q: [f32; 4]) -> Quat {
    // [x, y, z, w] in glTF
    Quat::new(q[3], -q[0], -q[1], q[2])
}

fn channel(
    source: &gltf::animation::Channel<'_>,
    buffers: &[Vec<u8>],
    target: Transform,
) -> Option<Channel> {
    let reader = source.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let times: Vec<f32> = reader.read_inputs()?.collect();
    let built = match reader.read_outputs()? {
        ReadOutputs::Translations(values) => {
            let values: Vec<Vec3> = values.map(|v| Vec3::from(mirror_z(v))).collect();
            let values = sample_values(values, times.len());
            KeyFrames::<Vec3>::linear(times.into_iter().zip(values))
                .map(|keyframes| Channel::Position { target, keyframes })
        }
        ReadOutputs::Rotations(values) => {
            let values: Vec<Quat> = values.into_f32().map(mirror_rotation).collect();
            let values = sample_values(values, times.len());
            KeyFrames::<Quat>::spherical(times.into_iter().zip(values))
                .map(|keyframes| Channel::Rotation { target, keyframes })
        }
        ReadOutputs::Scales(values) => {
            let values: Vec<Vec3> = values.map(Vec3::from).collect();
            let values = sample_values(values, times.len());
            KeyFrames::<Vec3>::linear(times.into_iter().zip(values))
                .map(|keyframes| Channel::Scale { target, keyframes })
        }
        ReadOutputs::MorphTargetWeights(_) => {
            log::debug!("Morph target channels are not imported");
            return None;
        }
    };
    built
        .map_err(|e| log::warn!("Skipping animation channel {}: {}", source.index(), e))
        .ok()
}

/// Animations of `document` bound to the transforms created per node index.
pub fn gltf_animations(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    transforms: &HashMap<usize, Transform>,
) -> Vec<Rc<Animation>> {
    let mut animations = Vec::new();
    for animation in document.animations() {
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Animation{}", animation.index()));
        let channels: Vec<Channel> = animation
            .channels()
            .filter_map(|c| {
                let target = transforms.get(&c.target().node().index())?.clone();
                channel(&c, buffers, target)
            })
            .collect();
        match Animation::new(&name, channels) {
            Ok(animation) => animations.push(Rc::new(animation)),
            Err(e) => log::warn!("Animation {} was not imported: {}", name, e),
        }
    }
    animations
}
