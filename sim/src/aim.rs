//! Smoothed look orientation, independent of the flyer's heading.
//!
//! Yaw and pitch are measured inside a reference frame that the caller
//! re-bases whenever the flyer settles somewhere new on the sphere.

use nestflight_shared::config::{AimConfig, ConfigError};
use nestflight_shared::math::{damping_factor, normalize_or, orientation_from_basis, DQuat, DVec3, FORWARD};

/// Look input for one frame. Both channels are optional and additive.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AimInput {
    /// Analog look axis, positive looks right, in [-1, 1]
    pub axis_x: f64,
    /// Analog look axis, positive looks up, in [-1, 1]
    pub axis_y: f64,
    /// Pointer movement this frame (pixels, screen y down)
    pub pointer_dx: f64,
    pub pointer_dy: f64,
}

/// Basis the aim angles are measured in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    pub forward: DVec3,
    pub up: DVec3,
    pub right: DVec3,
}

impl ReferenceFrame {
    pub fn from_quaternion(q: DQuat) -> Self {
        Self {
            forward: q * FORWARD,
            up: q * DVec3::Y,
            right: q * DVec3::X,
        }
    }
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::from_quaternion(DQuat::IDENTITY)
    }
}

pub struct AimRig {
    config: AimConfig,
    smoothed_x: f64,
    smoothed_y: f64,
    yaw: f64,
    pitch: f64,
    reference: ReferenceFrame,
    active: bool,
}

impl AimRig {
    pub fn new() -> Self {
        Self::from_valid(AimConfig::default())
    }

    pub fn try_new(config: AimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: AimConfig) -> Self {
        Self {
            active: config.start_active,
            config,
            smoothed_x: 0.0,
            smoothed_y: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            reference: ReferenceFrame::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn reference(&self) -> ReferenceFrame {
        self.reference
    }

    /// Smoothed analog axes (x, y)
    pub fn smoothed_axes(&self) -> (f64, f64) {
        (self.smoothed_x, self.smoothed_y)
    }

    /// Enable or disable look input. Deactivating also recentres the view.
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        self.smoothed_x = 0.0;
        self.smoothed_y = 0.0;
        if !active {
            self.yaw = 0.0;
            self.pitch = 0.0;
        }
    }

    /// Re-base the aim on a new orientation and recentre.
    pub fn set_reference_from_quaternion(&mut self, orientation: DQuat) {
        self.reference = ReferenceFrame::from_quaternion(orientation.normalize());
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.smoothed_x = 0.0;
        self.smoothed_y = 0.0;
    }

    pub fn update(&mut self, input: &AimInput, dt: f64) {
        if !self.active {
            return;
        }
        let dt = dt.clamp(0.0, self.config.max_dt);
        let max_pitch = self.config.max_pitch;

        let step = damping_factor(self.config.smoothing, dt);
        self.smoothed_x += (input.axis_x.clamp(-1.0, 1.0) - self.smoothed_x) * step;
        self.smoothed_y += (input.axis_y.clamp(-1.0, 1.0) - self.smoothed_y) * step;

        // Positive yaw turns left (counter-clockwise about up)
        self.yaw -= self.smoothed_x * self.config.yaw_rate * dt;
        self.pitch = (self.pitch + self.smoothed_y * self.config.pitch_rate * dt)
            .clamp(-max_pitch, max_pitch);

        if input.pointer_dx != 0.0 || input.pointer_dy != 0.0 {
            let sensitivity = self.config.pointer_sensitivity;
            self.yaw -= input.pointer_dx * sensitivity;
            self.pitch = (self.pitch - input.pointer_dy * sensitivity).clamp(-max_pitch, max_pitch);
        }
    }

    /// Look orientation: yaw about the reference up, then pitch about the yawed right axis.
    pub fn quaternion(&self) -> DQuat {
        let ReferenceFrame { forward, up, right } = self.reference;

        let yawed_forward = DQuat::from_axis_angle(up, self.yaw) * forward;
        let yawed_right = normalize_or(yawed_forward.cross(up), right);
        let pitched_forward = DQuat::from_axis_angle(yawed_right, self.pitch) * yawed_forward;
        let pitched_up = yawed_right.cross(pitched_forward);

        orientation_from_basis(yawed_right, pitched_up, -pitched_forward)
    }

    pub fn look_direction(&self) -> DVec3 {
        self.quaternion() * FORWARD
    }
}

impl Default for AimRig {
    fn default() -> Self {
        Self::new()
    }
}
