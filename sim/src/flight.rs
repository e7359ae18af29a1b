//! Arcade flight model.
//!
//! Forward speed is constant unless set explicitly. Steering turns the body
//! (yaw about world up, pitch about the body's own right axis) and pitch also
//! drives a damped vertical speed, so climbs and dives ease in and out.

use nestflight_shared::config::{ConfigError, FlightConfig};
use nestflight_shared::math::{damp, damping_factor, DQuat, DVec3, FORWARD};

/// Anything the nesting state machine can steer.
///
/// Position, velocity and orientation are required. `set_speed` and
/// `set_orientation` have fallbacks for bodies without a speed model or bank.
pub trait FlightBody {
    fn position(&self) -> DVec3;
    fn set_position(&mut self, position: DVec3);
    fn velocity(&self) -> DVec3;
    fn set_velocity(&mut self, velocity: DVec3);
    fn orientation(&self) -> DQuat;
    fn set_orientation_raw(&mut self, orientation: DQuat);

    /// Direction the body is facing.
    fn look_forward(&self) -> DVec3 {
        self.orientation() * FORWARD
    }

    fn set_speed(&mut self, _speed: f64) {}

    fn set_orientation(&mut self, orientation: DQuat, _preserve_bank: bool) {
        self.set_orientation_raw(orientation);
    }
}

/// Kinematic state of the flyer
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KinematicState {
    pub position: DVec3,
    pub velocity: DVec3,
    pub orientation: DQuat,
    pub speed: f64,
    /// Visual bank angle (radians), positive banks left
    pub roll: f64,
    pub smoothed_yaw: f64,
    pub smoothed_pitch: f64,
    pub input_yaw: f64,
    pub input_pitch: f64,
}

pub struct FlightController {
    config: FlightConfig,
    state: KinematicState,
    forward: DVec3,
    invert_pitch: bool,
}

impl FlightController {
    pub fn new(position: DVec3) -> Self {
        Self::from_valid(FlightConfig::default(), position)
    }

    pub fn try_new(config: FlightConfig, position: DVec3) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config, position))
    }

    fn from_valid(config: FlightConfig, position: DVec3) -> Self {
        let mut flight = Self {
            state: KinematicState {
                position,
                velocity: DVec3::ZERO,
                orientation: DQuat::IDENTITY,
                speed: 0.0,
                roll: 0.0,
                smoothed_yaw: 0.0,
                smoothed_pitch: 0.0,
                input_yaw: 0.0,
                input_pitch: 0.0,
            },
            forward: FORWARD,
            invert_pitch: false,
            config,
        };
        flight.respawn(position, DQuat::IDENTITY);
        flight
    }

    /// Put the flyer back at `position` in level flight at the default speed.
    /// Keeps the pitch inversion setting.
    pub fn respawn(&mut self, position: DVec3, orientation: DQuat) {
        let orientation = orientation.normalize();
        let forward = orientation * FORWARD;
        let speed = self.config.default_speed;
        self.state = KinematicState {
            position,
            velocity: DVec3::new(forward.x * speed, 0.0, forward.z * speed),
            orientation,
            speed,
            roll: 0.0,
            smoothed_yaw: 0.0,
            smoothed_pitch: 0.0,
            input_yaw: 0.0,
            input_pitch: 0.0,
        };
        self.forward = forward;
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn speed(&self) -> f64 {
        self.state.speed
    }

    pub fn forward(&self) -> DVec3 {
        self.forward
    }

    /// Raw steering input, each clamped to [-1, 1]. Positive yaw turns right, positive pitch climbs.
    pub fn set_inputs(&mut self, yaw: f64, pitch: f64) {
        self.state.input_yaw = yaw.clamp(-1.0, 1.0);
        self.state.input_pitch = pitch.clamp(-1.0, 1.0);
    }

    pub fn set_invert_pitch(&mut self, invert: bool) {
        self.invert_pitch = invert;
    }

    pub fn update(&mut self, dt: f64) {
        let cfg = &self.config;
        let s = &mut self.state;

        s.smoothed_yaw = damp(s.smoothed_yaw, s.input_yaw, cfg.yaw_response, dt);
        s.smoothed_pitch = damp(s.smoothed_pitch, s.input_pitch, cfg.pitch_response, dt);
        let pitch = if self.invert_pitch {
            -s.smoothed_pitch
        } else {
            s.smoothed_pitch
        };

        // World-space yaw on the left, body-space pitch on the right
        let yaw_rotation = DQuat::from_axis_angle(DVec3::Y, -s.smoothed_yaw * cfg.yaw_rate * dt);
        let pitch_rotation = DQuat::from_axis_angle(DVec3::X, pitch * cfg.pitch_rate * dt);
        s.orientation = (yaw_rotation * s.orientation * pitch_rotation).normalize();
        self.forward = s.orientation * FORWARD;

        let target_roll = -s.smoothed_yaw * cfg.max_bank;
        s.roll = damp(s.roll, target_roll, cfg.roll_response, dt);

        let target_vertical = pitch * cfg.lift_force + cfg.neutral_lift - cfg.gravity;
        let vertical = s.velocity.y
            + (target_vertical - s.velocity.y) * damping_factor(cfg.vertical_response, dt);

        let horizontal = self.forward * s.speed;
        s.velocity = DVec3::new(horizontal.x, vertical, horizontal.z);
        s.position += s.velocity * dt;

        if let Some(floor) = cfg.min_altitude {
            if s.position.y < floor {
                s.position.y = floor;
                if s.velocity.y < 0.0 {
                    s.velocity.y = 0.0;
                }
            }
        }
    }
}

impl FlightBody for FlightController {
    fn position(&self) -> DVec3 {
        self.state.position
    }

    fn set_position(&mut self, position: DVec3) {
        self.state.position = position;
    }

    fn velocity(&self) -> DVec3 {
        self.state.velocity
    }

    fn set_velocity(&mut self, velocity: DVec3) {
        self.state.velocity = velocity;
    }

    fn orientation(&self) -> DQuat {
        self.state.orientation
    }

    fn set_orientation_raw(&mut self, orientation: DQuat) {
        self.state.orientation = orientation.normalize();
        self.forward = self.state.orientation * FORWARD;
    }

    fn look_forward(&self) -> DVec3 {
        self.forward
    }

    /// Clamped to [0, max_speed].
    fn set_speed(&mut self, speed: f64) {
        self.state.speed = speed.clamp(0.0, self.config.max_speed);
    }

    fn set_orientation(&mut self, orientation: DQuat, preserve_bank: bool) {
        self.set_orientation_raw(orientation);
        if !preserve_bank {
            self.state.roll = 0.0;
            self.state.smoothed_yaw = 0.0;
            self.state.smoothed_pitch = 0.0;
        }
    }
}
