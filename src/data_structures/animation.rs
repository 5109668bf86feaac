//! Keyframe tracks, animations and the animator playback state machine.
//!
//! A [`KeyFrames`] track clamps at its ends; looping is the [`Animator`]'s
//! job. An [`Animation`] is a set of [`Channel`]s, each binding a track to
//! one settable property, and evaluating it writes the sampled values
//! straight through those bindings.

use std::{fmt::Debug, rc::Rc};

use crate::{
    data_structures::transform::Transform,
    flow::FrameContext,
    math::{self, Quat, Vec3},
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnimationError {
    #[error("a keyframe track needs at least one sample")]
    Empty,
    #[error("keyframe time {0} is not a finite number")]
    InvalidTime(f32),
    #[error("two keyframes share the time {0}")]
    DuplicateTime(f32),
    #[error("an animation needs at least one channel")]
    NoChannels,
}

/// Blends two samples by `t` in `[0, 1]`.
pub type Interpolator<T> = fn(&T, &T, f32) -> T;

/// A strictly time-sorted sequence of samples.
#[derive(Clone)]
pub struct KeyFrames<T> {
    times: Vec<f32>,
    values: Vec<T>,
    interpolate: Interpolator<T>,
}

impl<T: Clone> KeyFrames<T> {
    /// Builds a track from unordered samples.
    pub fn new(
        samples: impl IntoIterator<Item = (f32, T)>,
        interpolate: Interpolator<T>,
    ) -> Result<Self, AnimationError> {
        let mut samples: Vec<(f32, T)> = samples.into_iter().collect();
        if samples.is_empty() {
            return Err(AnimationError::Empty);
        }
        if let Some((time, _)) = samples.iter().find(|(time, _)| !time.is_finite()) {
            return Err(AnimationError::InvalidTime(*time));
        }
        samples.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        if let Some(pair) = samples.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(AnimationError::DuplicateTime(pair[0].0));
        }
        let (times, values) = samples.into_iter().unzip();
        Ok(Self {
            times,
            values,
            interpolate,
        })
    }

    /// Samples the track at `t`, clamping outside of `[start, end]`.
    pub fn evaluate(&self, t: f32) -> T {
        let last = self.times.len() - 1;
        if t.is_nan() || t <= self.times[0] {
            return self.values[0].clone();
        }
        if t >= self.times[last] {
            return self.values[last].clone();
        }
        // first index with time >= t, never 0 here
        let next = self.times.partition_point(|time| *time < t);
        let prev = next - 1;
        let (t0, t1) = (self.times[prev], self.times[next]);
        let u = (t - t0) / (t1 - t0);
        (self.interpolate)(&self.values[prev], &self.values[next], u)
    }

    pub fn start(&self) -> f32 {
        self.times[0]
    }

    pub fn end(&self) -> f32 {
        self.times[self.times.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }
}

impl KeyFrames<f32> {
    pub fn linear(samples: impl IntoIterator<Item = (f32, f32)>) -> Result<Self, AnimationError> {
        Self::new(samples, math::lerp_f32)
    }
}

impl KeyFrames<Vec3> {
    pub fn linear(samples: impl IntoIterator<Item = (f32, Vec3)>) -> Result<Self, AnimationError> {
        Self::new(samples, math::lerp_vec3)
    }
}

impl KeyFrames<Quat> {
    pub fn spherical(samples: impl IntoIterator<Item = (f32, Quat)>) -> Result<Self, AnimationError> {
        Self::new(samples, math::slerp)
    }
}

impl<T: Debug> Debug for KeyFrames<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFrames")
            .field("times", &self.times)
            .field("values", &self.values)
            .finish()
    }
}

/// One animated property and its track.
pub enum Channel {
    Position {
        target: Transform,
        keyframes: KeyFrames<Vec3>,
    },
    Rotation {
        target: Transform,
        keyframes: KeyFrames<Quat>,
    },
    Scale {
        target: Transform,
        keyframes: KeyFrames<Vec3>,
    },
    Float {
        target: Box<dyn Fn(f32)>,
        keyframes: KeyFrames<f32>,
    },
    Vector {
        target: Box<dyn Fn(Vec3)>,
        keyframes: KeyFrames<Vec3>,
    },
}

impl Channel {
    pub fn float(target: impl Fn(f32) + 'static, keyframes: KeyFrames<f32>) -> Self {
        Channel::Float {
            target: Box::new(target),
            keyframes,
        }
    }

    pub fn vector(target: impl Fn(Vec3) + 'static, keyframes: KeyFrames<Vec3>) -> Self {
        Channel::Vector {
            target: Box::new(target),
            keyframes,
        }
    }

    /// Samples the track and writes the value to the bound property.
    pub fn apply(&self, t: f32) {
        match self {
            Channel::Position { target, keyframes } => target.set_position(keyframes.evaluate(t)),
            Channel::Rotation { target, keyframes } => target.set_rotation(keyframes.evaluate(t)),
            Channel::Scale { target, keyframes } => target.set_scale(keyframes.evaluate(t)),
            Channel::Float { target, keyframes } => target(keyframes.evaluate(t)),
            Channel::Vector { target, keyframes } => target(keyframes.evaluate(t)),
        }
    }

    pub fn start(&self) -> f32 {
        match self {
            Channel::Position { keyframes, .. } | Channel::Scale { keyframes, .. } => {
                keyframes.start()
            }
            Channel::Rotation { keyframes, .. } => keyframes.start(),
            Channel::Float { keyframes, .. } => keyframes.start(),
            Channel::Vector { keyframes, .. } => keyframes.start(),
        }
    }

    pub fn end(&self) -> f32 {
        match self {
            Channel::Position { keyframes, .. } | Channel::Scale { keyframes, .. } => {
                keyframes.end()
            }
            Channel::Rotation { keyframes, .. } => keyframes.end(),
            Channel::Float { keyframes, .. } => keyframes.end(),
            Channel::Vector { keyframes, .. } => keyframes.end(),
        }
    }
}

impl Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Channel::Position { .. } => "Position",
            Channel::Rotation { .. } => "Rotation",
            Channel::Scale { .. } => "Scale",
            Channel::Float { .. } => "Float",
            Channel::Vector { .. } => "Vector",
        };
        write!(f, "Channel::{}({}..{})", kind, self.start(), self.end())
    }
}

/// A named set of channels spanning `[start, end]` across all of them.
#[derive(Debug)]
pub struct Animation {
    pub name: String,
    channels: Vec<Channel>,
    start: f32,
    end: f32,
}

impl Animation {
    pub fn new(name: &str, channels: Vec<Channel>) -> Result<Self, AnimationError> {
        if channels.is_empty() {
            return Err(AnimationError::NoChannels);
        }
        let start = channels.iter().map(Channel::start).fold(f32::INFINITY, f32::min);
        let end = channels.iter().map(Channel::end).fold(f32::NEG_INFINITY, f32::max);
        Ok(Self {
            name: name.to_string(),
            channels,
            start,
            end,
        })
    }

    /// Applies every channel at time `t`.
    pub fn evaluate(&self, t: f32) {
        self.channels.iter().for_each(|channel| channel.apply(t));
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// Plays one [`Animation`] against the frame clock.
///
/// While playing, every update advances the clock by the frame delta and
/// applies the animation. Reaching the end resets the clock to the start:
/// looping animators keep playing, the others stop. Large deltas do not
/// wrap around, so skipped loops are not caught up.
#[derive(Clone, Debug)]
pub struct Animator {
    animation: Rc<Animation>,
    time: f32,
    state: PlaybackState,
    pub play_on_start: bool,
    pub looping: bool,
}

impl Animator {
    pub fn new(animation: Rc<Animation>, play_on_start: bool, looping: bool) -> Self {
        let time = animation.start();
        Self {
            animation,
            time,
            state: match play_on_start {
                true => PlaybackState::Playing,
                false => PlaybackState::Stopped,
            },
            play_on_start,
            looping,
        }
    }

    /// Rewinds the clock. The playback state is left as it is.
    pub fn start(&mut self) {
        self.time = self.animation.start();
    }

    pub fn update(&mut self, frame: &FrameContext) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.time += frame.delta;
        self.animation.evaluate(self.time);
        if self.time >= self.animation.end() {
            if self.looping {
                self.replay();
            } else {
                self.stop();
            }
        }
    }

    /// Switches to `animation`, resetting the clock and keeping the flags.
    pub fn play(&mut self, animation: Rc<Animation>) {
        self.animation = animation;
        self.time = self.animation.start();
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.time = self.animation.start();
    }

    pub fn replay(&mut self) {
        self.time = self.animation.start();
        self.state = PlaybackState::Playing;
    }

    /// Continues from the current clock.
    pub fn resume(&mut self) {
        self.state = PlaybackState::Playing;
    }

    /// Stops advancing without resetting the clock.
    pub fn pause(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn animation(&self) -> &Rc<Animation> {
        &self.animation
    }
}
