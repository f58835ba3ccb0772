//! Motion simulation turning mapped swing, tilt, point and shake controls into
//! position, orientation, velocity and acceleration of the remote.
//!
//! All functions advance a state by one fixed time step. The exact constants only shape
//! the feel of the simulation, what matters is that every quantity follows its input in
//! the right direction and stays bounded.

use crate::host::{Axis, Control, ControlSource, Direction};
use crate::math::{Matrix33, Vec3, TAU};

/// Distance travelled by a full swing, in meters.
pub const SWING_DISTANCE: f32 = 0.25;
const SWING_STIFFNESS: f32 = 400.0;
const SWING_DAMPING: f32 = 40.0;
const SWING_MAX_ACCELERATION: f32 = 50.0;
/// Rotation caused by a full swing, in radians.
const SWING_ANGLE: f32 = 0.5;

pub const TILT_MAX_ANGLE: f32 = TAU * 85.0 / 360.0;
const TILT_SPEED: f32 = TAU;

const CURSOR_YAW_RANGE: f32 = TAU * 25.0 / 360.0;
const CURSOR_PITCH_RANGE: f32 = TAU * 20.0 / 360.0;
const CURSOR_RESPONSE: f32 = 30.0;

pub const SHAKE_DISTANCE: f32 = 0.05;
pub const SHAKE_FREQUENCY: f32 = 6.0;

const IMU_RECENTER_RATE: f32 = 2.0;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PositionalState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RotationalState {
    pub angle: Vec3,
    pub angular_velocity: Vec3,
}

/// Position and orientation, used by swing and point.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MotionState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub angle: Vec3,
    pub angular_velocity: Vec3,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ShakeState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    /// Oscillation progress per axis in cycles.
    pub progress: Vec3,
    /// Amplitude of the running oscillation per axis.
    pub intensity: Vec3,
}

/// Pointer driven by a gyroscope instead of mapped buttons.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuCursorState {
    pub rotation: Matrix33,
    pub recentered_pitch: f32,
}

/// Reads a directional group as a vector: `x` right, `y` forward, `z` up.
pub fn directional_input(
    source: &dyn ControlSource,
    control: impl Fn(Direction) -> Control,
) -> Vec3 {
    Vec3::new(
        source.axis(control(Direction::Left), control(Direction::Right)),
        source.axis(control(Direction::Backward), control(Direction::Forward)),
        source.axis(control(Direction::Down), control(Direction::Up)),
    )
}

/// Reads a shake group as per-axis intensities in `0.0..=1.0`.
pub fn shake_input(source: &dyn ControlSource, control: impl Fn(Axis) -> Control) -> Vec3 {
    Vec3::new(
        source.state(control(Axis::X)),
        source.state(control(Axis::Y)),
        source.state(control(Axis::Z)),
    )
    .map(|v| v.clamp(0.0, 1.0))
}

fn clamp_length(v: Vec3, max: f32) -> Vec3 {
    let length = v.length();
    if length > max {
        v * (max / length)
    } else {
        v
    }
}

/// Moves the remote towards the swing target on a damped spring.
pub fn emulate_swing(state: &mut MotionState, input: Vec3, dt: f32) {
    let target = input.map(|v| v.clamp(-1.0, 1.0)) * SWING_DISTANCE;

    let spring = (target - state.position) * SWING_STIFFNESS - state.velocity * SWING_DAMPING;
    let acceleration = clamp_length(spring, SWING_MAX_ACCELERATION);

    state.velocity += acceleration * dt;
    state.position += state.velocity * dt;
    state.position = state
        .position
        .map(|v| v.clamp(-SWING_DISTANCE, SWING_DISTANCE));
    state.acceleration = acceleration;

    // Swinging up pitches the remote up, swinging right yaws it right.
    let progress = state.position * (1.0 / SWING_DISTANCE);
    let angle = Vec3::new(progress.z * SWING_ANGLE, 0.0, -progress.x * SWING_ANGLE);
    state.angular_velocity = (angle - state.angle) * (1.0 / dt);
    state.angle = angle;
}

/// Rotates towards the tilt target at a bounded angular speed.
///
/// `input.y` tilts forward (pitch down), `input.x` rolls right.
pub fn emulate_tilt(state: &mut RotationalState, input: Vec3, dt: f32) {
    let target = Vec3::new(
        -input.y.clamp(-1.0, 1.0) * TILT_MAX_ANGLE,
        input.x.clamp(-1.0, 1.0) * TILT_MAX_ANGLE,
        0.0,
    );
    let max_step = TILT_SPEED * dt;
    let step = (target - state.angle).map(|v| v.clamp(-max_step, max_step));

    state.angle += step;
    state.angular_velocity = step * (1.0 / dt);
}

/// Aims the remote at the pointer position. A hidden pointer aims at the floor.
///
/// `input.x` points right, `input.z` points up.
pub fn emulate_cursor(state: &mut MotionState, input: Vec3, hidden: bool, dt: f32) {
    let target = if hidden {
        Vec3::new(-TAU / 4.0, 0.0, 0.0)
    } else {
        Vec3::new(
            input.z.clamp(-1.0, 1.0) * CURSOR_PITCH_RANGE,
            0.0,
            -input.x.clamp(-1.0, 1.0) * CURSOR_YAW_RANGE,
        )
    };
    let factor = (CURSOR_RESPONSE * dt).min(1.0);
    let step = (target - state.angle) * factor;

    state.angle += step;
    state.angular_velocity = step * (1.0 / dt);
}

/// Oscillates each axis whose shake control is held.
///
/// A released axis finishes its current half cycle so it always comes to rest at zero.
pub fn emulate_shake(state: &mut ShakeState, input: Vec3, dt: f32) {
    let omega = TAU * SHAKE_FREQUENCY;

    let axis = |position: &mut f32,
                velocity: &mut f32,
                acceleration: &mut f32,
                progress: &mut f32,
                intensity: &mut f32,
                held: f32| {
        if held > 0.0 {
            *intensity = held * SHAKE_DISTANCE;
        } else if *progress == 0.0 {
            *position = 0.0;
            *velocity = 0.0;
            *acceleration = 0.0;
            return;
        }

        let previous_half = (*progress * 2.0).floor();
        *progress += SHAKE_FREQUENCY * dt;
        if held <= 0.0 && (*progress * 2.0).floor() > previous_half {
            *progress = 0.0;
            *position = 0.0;
            *velocity = 0.0;
            *acceleration = 0.0;
            return;
        }
        *progress %= 1.0;

        let (sin, cos) = (*progress * TAU).sin_cos();
        *position = *intensity * sin;
        *velocity = *intensity * omega * cos;
        *acceleration = -*intensity * omega * omega * sin;
    };

    let s = state;
    axis(
        &mut s.position.x,
        &mut s.velocity.x,
        &mut s.acceleration.x,
        &mut s.progress.x,
        &mut s.intensity.x,
        input.x,
    );
    axis(
        &mut s.position.y,
        &mut s.velocity.y,
        &mut s.acceleration.y,
        &mut s.progress.y,
        &mut s.intensity.y,
        input.y,
    );
    axis(
        &mut s.position.z,
        &mut s.velocity.z,
        &mut s.acceleration.z,
        &mut s.progress.z,
        &mut s.intensity.z,
        input.z,
    );
}

/// Integrates the gyroscope into a pointing rotation, slowly leveling pitch with gravity.
pub fn emulate_imu_cursor(
    state: &mut ImuCursorState,
    angular_velocity: Option<Vec3>,
    acceleration: Option<Vec3>,
    recenter: bool,
    dt: f32,
) {
    let Some(angular_velocity) = angular_velocity else {
        *state = ImuCursorState::default();
        return;
    };

    if recenter {
        state.rotation = Matrix33::IDENTITY;
        state.recentered_pitch = 0.0;
        return;
    }

    state.rotation = state.rotation * Matrix33::from_angles(angular_velocity * dt);

    if let Some(acceleration) = acceleration {
        // Pitch of the remote as seen by gravity.
        let measured = (-acceleration.y).atan2(acceleration.z.abs().max(f32::EPSILON));
        let max_step = IMU_RECENTER_RATE * dt;
        let step = (measured - state.recentered_pitch).clamp(-max_step, max_step);
        state.recentered_pitch =
            (state.recentered_pitch + step).clamp(-TAU / 4.0, TAU / 4.0);
    }
}
