use std::{cell::Cell, rc::Rc};

use approx::assert_relative_eq;
use reef_ngin::{
    data_structures::{
        animation::{Animation, AnimationError, Animator, Channel, KeyFrames, PlaybackState},
        scene_graph::{Scene, SceneObject},
        transform::Transform,
    },
    flow::FrameContext,
    math::{self, Quat, Vec3},
};

fn step(delta: f32) -> FrameContext {
    FrameContext::new(delta, 0.0, 0)
}

/// A float channel over `[0, 10]` going from 0 to 10, recording into the cell.
fn ramp(value: Rc<Cell<f32>>) -> Rc<Animation> {
    let keyframes = KeyFrames::<f32>::linear([(0.0, 0.0), (10.0, 10.0)]).unwrap();
    let channel = Channel::float(move |v| value.set(v), keyframes);
    Rc::new(Animation::new("Ramp", vec![channel]).unwrap())
}

#[test]
fn keyframes_clamp_at_both_ends() {
    let a = Vec3::new(1.0, 2.0, 3.0);
    let b = Vec3::new(-4.0, 0.0, 8.0);
    let track = KeyFrames::<Vec3>::linear([(0.0, a), (5.0, b)]).unwrap();
    assert_eq!(track.evaluate(-1.0), a);
    assert_eq!(track.evaluate(10.0), b);
    assert_eq!(track.evaluate(0.0), a);
    assert_eq!(track.evaluate(5.0), b);
}

#[test]
fn keyframes_interpolate_linearly() {
    let track = KeyFrames::<f32>::linear([(0.0, 0.0), (10.0, 10.0)]).unwrap();
    assert_relative_eq!(track.evaluate(5.0), 5.0);
    assert_relative_eq!(track.evaluate(2.5), 2.5);
}

#[test]
fn keyframes_pick_the_bracketing_pair() {
    let track = KeyFrames::<f32>::linear([(4.0, 40.0), (0.0, 0.0), (2.0, 10.0)]).unwrap();
    assert_eq!(track.times(), &[0.0, 2.0, 4.0]);
    assert_relative_eq!(track.evaluate(1.0), 5.0);
    assert_relative_eq!(track.evaluate(3.0), 25.0);
}

#[test]
fn single_sample_is_constant() {
    let track = KeyFrames::<f32>::linear([(3.0, 7.0)]).unwrap();
    assert_eq!(track.evaluate(-5.0), 7.0);
    assert_eq!(track.evaluate(3.0), 7.0);
    assert_eq!(track.evaluate(50.0), 7.0);
}

#[test]
fn invalid_tracks_are_rejected() {
    let empty: [(f32, f32); 0] = [];
    assert_eq!(
        KeyFrames::<f32>::linear(empty).unwrap_err(),
        AnimationError::Empty
    );
    assert_eq!(
        KeyFrames::<f32>::linear([(1.0, 0.0), (1.0, 2.0)]).unwrap_err(),
        AnimationError::DuplicateTime(1.0)
    );
    assert!(matches!(
        KeyFrames::<f32>::linear([(f32::NAN, 0.0)]),
        Err(AnimationError::InvalidTime(_))
    ));
    assert_eq!(
        Animation::new("Nothing", Vec::new()).unwrap_err(),
        AnimationError::NoChannels
    );
}

#[test]
fn rotations_use_the_shortest_arc() {
    let a = math::axis_angle(math::UP, 10.0);
    let b = -math::axis_angle(math::UP, 30.0);
    let track = KeyFrames::<Quat>::spherical([(0.0, a), (1.0, b)]).unwrap();
    let mid = track.evaluate(0.5);
    let expected = math::axis_angle(math::UP, 20.0);
    assert_relative_eq!(mid.s.abs(), expected.s, epsilon = 1e-5);
    assert_relative_eq!(mid.v.y.abs(), expected.v.y, epsilon = 1e-5);
}

#[test]
fn animation_spans_all_channels() {
    let target = Transform::new();
    let position = KeyFrames::<Vec3>::linear([(1.0, Vec3::new(0.0, 0.0, 0.0)), (4.0, Vec3::new(3.0, 0.0, 0.0))]).unwrap();
    let scale = KeyFrames::<Vec3>::linear([(0.5, Vec3::new(1.0, 1.0, 1.0)), (2.0, Vec3::new(2.0, 2.0, 2.0))]).unwrap();
    let animation = Animation::new(
        "Move",
        vec![
            Channel::Position {
                target: target.clone(),
                keyframes: position,
            },
            Channel::Scale {
                target: target.clone(),
                keyframes: scale,
            },
        ],
    )
    .unwrap();
    assert_eq!(animation.start(), 0.5);
    assert_eq!(animation.end(), 4.0);
    assert_eq!(animation.duration(), 3.5);

    animation.evaluate(2.5);
    assert_relative_eq!(target.position().x, 1.5);
    assert_relative_eq!(target.scale().x, 2.0);
}

#[test]
fn animator_loops_back_to_start() {
    let value = Rc::new(Cell::new(-1.0));
    let mut animator = Animator::new(ramp(value.clone()), true, true);
    animator.start();
    assert_eq!(animator.state(), PlaybackState::Playing);

    for _ in 0..12 {
        animator.update(&step(1.0));
    }
    assert_relative_eq!(value.get(), 2.0);
    assert_relative_eq!(animator.time(), 2.0);
    assert!(animator.is_playing());
}

#[test]
fn animator_stops_at_the_end() {
    let value = Rc::new(Cell::new(-1.0));
    let mut animator = Animator::new(ramp(value.clone()), true, false);
    animator.start();
    for _ in 0..11 {
        animator.update(&step(1.0));
    }
    assert_eq!(animator.state(), PlaybackState::Stopped);
    assert_eq!(animator.time(), 0.0);
    // the last applied value is the clamped end
    assert_relative_eq!(value.get(), 10.0);
}

#[test]
fn large_steps_do_not_catch_up() {
    let value = Rc::new(Cell::new(-1.0));
    let mut animator = Animator::new(ramp(value.clone()), true, true);
    animator.start();
    animator.update(&step(25.0));
    assert_relative_eq!(value.get(), 10.0);
    assert_eq!(animator.time(), 0.0);
    animator.update(&step(1.0));
    assert_relative_eq!(value.get(), 1.0);
}

#[test]
fn animator_plays_without_being_started() {
    let value = Rc::new(Cell::new(-1.0));
    let mut animator = Animator::new(ramp(value.clone()), true, false);
    assert!(animator.is_playing());
    animator.update(&step(1.0));
    assert_relative_eq!(value.get(), 1.0);
    assert_relative_eq!(animator.time(), 1.0);
}

#[test]
fn start_rewinds_without_touching_playback() {
    let value = Rc::new(Cell::new(-1.0));
    let mut animator = Animator::new(ramp(value), true, true);
    animator.update(&step(2.0));
    animator.pause();
    animator.start();
    assert_eq!(animator.time(), 0.0);
    assert_eq!(animator.state(), PlaybackState::Stopped);
}

#[test]
fn animator_without_play_on_start_waits() {
    let value = Rc::new(Cell::new(-1.0));
    let mut animator = Animator::new(ramp(value.clone()), false, true);
    animator.start();
    animator.update(&step(1.0));
    assert_eq!(animator.state(), PlaybackState::Stopped);
    assert_eq!(value.get(), -1.0);

    animator.resume();
    animator.update(&step(1.0));
    assert_relative_eq!(value.get(), 1.0);
}

#[test]
fn play_switches_animation_and_resets_clock() {
    let first = Rc::new(Cell::new(0.0));
    let second = Rc::new(Cell::new(0.0));
    let mut animator = Animator::new(ramp(first.clone()), true, true);
    animator.start();
    animator.update(&step(4.0));
    assert_relative_eq!(first.get(), 4.0);

    animator.play(ramp(second.clone()));
    assert_eq!(animator.time(), 0.0);
    assert!(animator.is_playing());
    animator.update(&step(1.0));
    assert_relative_eq!(second.get(), 1.0);
    assert_relative_eq!(first.get(), 4.0);
}

#[test]
fn pause_keeps_the_clock_and_stop_resets_it() {
    let value = Rc::new(Cell::new(0.0));
    let mut animator = Animator::new(ramp(value), true, true);
    animator.start();
    animator.update(&step(3.0));
    animator.pause();
    animator.update(&step(3.0));
    assert_relative_eq!(animator.time(), 3.0);
    animator.stop();
    assert_eq!(animator.time(), 0.0);
    animator.replay();
    assert!(animator.is_playing());
}

#[test]
fn animator_component_drives_its_object() {
    let mut scene = Scene::new();
    let object = SceneObject::new("Bird");
    let keyframes = KeyFrames::<Vec3>::linear([
        (0.0, Vec3::new(0.0, 0.0, 0.0)),
        (2.0, Vec3::new(0.0, 4.0, 0.0)),
    ])
    .unwrap();
    let animation = Animation::new(
        "Fly",
        vec![Channel::Position {
            target: object.transform().clone(),
            keyframes,
        }],
    )
    .unwrap();
    let object = object.with_component(Animator::new(Rc::new(animation), true, false));
    scene.add_object(object);

    scene.start(&step(0.0));
    scene.update(&step(0.5));
    let bird = scene.find("Bird").unwrap();
    assert_relative_eq!(bird.transform().position().y, 1.0);
    assert!(bird.animator().unwrap().is_playing());
}
