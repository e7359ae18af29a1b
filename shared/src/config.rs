//! Tunables for flight, aim, collision and nesting.
//! Defaults are the shipped game values.

use std::path::Path;

/// Reason a configuration cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn require_positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if !v.is_finite() || v <= 0.0 {
        return Err(invalid(field, "must be finite and > 0"));
    }
    Ok(())
}

fn require_non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if !v.is_finite() || v < 0.0 {
        return Err(invalid(field, "must be finite and >= 0"));
    }
    Ok(())
}

fn require_unit(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&v) {
        return Err(invalid(field, "must be within [0, 1]"));
    }
    Ok(())
}

/// Load any config from a JSON file. Missing fields take their defaults.
pub fn load_json<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Flight controller tuning
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "config/")]
#[serde(rename_all = "camelCase", default)]
pub struct FlightConfig {
    pub max_speed: f64,
    /// Forward speed at spawn and after take-off
    pub default_speed: f64,
    /// Turn rate at full yaw input (rad/s)
    pub yaw_rate: f64,
    /// Pitch rate at full pitch input (rad/s)
    pub pitch_rate: f64,
    pub yaw_response: f64,
    pub pitch_response: f64,
    pub vertical_response: f64,
    pub roll_response: f64,
    /// Vertical speed gained at full pitch input
    pub lift_force: f64,
    /// Lift with neutral pitch; equal to gravity means level flight
    pub neutral_lift: f64,
    pub gravity: f64,
    /// Cosmetic bank angle at full yaw input (radians)
    pub max_bank: f64,
    /// Flat floor height. `None` disables the clamp.
    pub min_altitude: Option<f64>,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            max_speed: 20.0,
            default_speed: 8.0,
            yaw_rate: 1.6,
            pitch_rate: 1.2,
            yaw_response: 6.0,
            pitch_response: 5.0,
            vertical_response: 3.0,
            roll_response: 4.0,
            lift_force: 6.0,
            neutral_lift: 2.0,
            gravity: 2.0,
            max_bank: 0.6, // ~34 degrees
            min_altitude: Some(0.5),
        }
    }
}

impl FlightConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("max_speed", self.max_speed)?;
        if !self.default_speed.is_finite()
            || self.default_speed < 0.0
            || self.default_speed > self.max_speed
        {
            return Err(invalid("default_speed", "must be within [0, max_speed]"));
        }
        require_non_negative("yaw_rate", self.yaw_rate)?;
        require_non_negative("pitch_rate", self.pitch_rate)?;
        require_positive("yaw_response", self.yaw_response)?;
        require_positive("pitch_response", self.pitch_response)?;
        require_positive("vertical_response", self.vertical_response)?;
        require_positive("roll_response", self.roll_response)?;
        require_non_negative("lift_force", self.lift_force)?;
        require_non_negative("neutral_lift", self.neutral_lift)?;
        require_non_negative("gravity", self.gravity)?;
        require_non_negative("max_bank", self.max_bank)?;
        if let Some(floor) = self.min_altitude {
            if !floor.is_finite() {
                return Err(invalid("min_altitude", "must be finite"));
            }
        }
        Ok(())
    }
}

/// Aim rig tuning
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "config/")]
#[serde(rename_all = "camelCase", default)]
pub struct AimConfig {
    /// Exponential convergence rate of the analog axes
    pub smoothing: f64,
    /// Yaw rate at full axis deflection (rad/s)
    pub yaw_rate: f64,
    /// Pitch rate at full axis deflection (rad/s)
    pub pitch_rate: f64,
    /// Radians per pointer pixel
    pub pointer_sensitivity: f64,
    pub max_pitch: f64,
    /// Upper bound on the per-frame step (seconds)
    pub max_dt: f64,
    pub start_active: bool,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            smoothing: 12.0,
            yaw_rate: 2.2,
            pitch_rate: 1.6,
            pointer_sensitivity: 0.0025,
            max_pitch: 1.2, // ~69 degrees
            max_dt: 0.05,
            start_active: true,
        }
    }
}

impl AimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("smoothing", self.smoothing)?;
        require_non_negative("aim yaw_rate", self.yaw_rate)?;
        require_non_negative("aim pitch_rate", self.pitch_rate)?;
        require_non_negative("pointer_sensitivity", self.pointer_sensitivity)?;
        if !self.max_pitch.is_finite()
            || self.max_pitch < 0.0
            || self.max_pitch >= std::f64::consts::FRAC_PI_2
        {
            return Err(invalid("max_pitch", "must be within [0, PI/2)"));
        }
        require_positive("max_dt", self.max_dt)?;
        Ok(())
    }
}

/// Ground sphere and bounce tuning
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "config/")]
#[serde(rename_all = "camelCase", default)]
pub struct CollisionConfig {
    pub sphere_radius: f64,
    pub ground_restitution: f64,
    pub object_restitution: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            sphere_radius: 50.0,
            ground_restitution: 0.3,
            object_restitution: 0.2,
        }
    }
}

impl CollisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("sphere_radius", self.sphere_radius)?;
        require_unit("ground_restitution", self.ground_restitution)?;
        require_unit("object_restitution", self.object_restitution)?;
        Ok(())
    }
}

/// Nesting state machine tuning
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "config/")]
#[serde(rename_all = "camelCase", default)]
pub struct NestingConfig {
    /// Landing completes below this distance to the target
    pub arrival_threshold: f64,
    /// Upper bound on landing approach speed
    pub auto_fly_speed: f64,
    /// Orientation slerp fraction per second while landing
    pub orientation_catch_up: f64,
    /// Seconds of boosted launch after take-off
    pub take_off_duration: f64,
    /// Launch speed at the start of take-off, decaying to zero
    pub take_off_boost: f64,
    /// Flight speed restored on take-off
    pub take_off_speed: f64,
    pub clearance_min: f64,
    pub clearance_max: f64,
    /// Share of the host clearance radius used as landing offset
    pub clearance_factor: f64,
    /// Weight of the look direction in the launch direction
    pub launch_forward_weight: f64,
}

impl Default for NestingConfig {
    fn default() -> Self {
        Self {
            arrival_threshold: 0.15,
            auto_fly_speed: 4.0,
            orientation_catch_up: 3.0,
            take_off_duration: 1.2,
            take_off_boost: 6.0,
            take_off_speed: 8.0,
            clearance_min: 0.6,
            clearance_max: 3.0,
            clearance_factor: 0.2,
            launch_forward_weight: 0.5,
        }
    }
}

impl NestingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("arrival_threshold", self.arrival_threshold)?;
        require_positive("auto_fly_speed", self.auto_fly_speed)?;
        require_positive("orientation_catch_up", self.orientation_catch_up)?;
        require_positive("take_off_duration", self.take_off_duration)?;
        require_non_negative("take_off_boost", self.take_off_boost)?;
        require_non_negative("take_off_speed", self.take_off_speed)?;
        require_non_negative("clearance_min", self.clearance_min)?;
        if !self.clearance_max.is_finite() || self.clearance_max < self.clearance_min {
            return Err(invalid("clearance_max", "must be finite and >= clearance_min"));
        }
        require_non_negative("clearance_factor", self.clearance_factor)?;
        require_non_negative("launch_forward_weight", self.launch_forward_weight)?;
        Ok(())
    }

    /// Outward landing offset for a nest whose host has the given clearance radius.
    pub fn clearance_offset(&self, host_clearance: f64) -> f64 {
        (host_clearance * self.clearance_factor)
            .min(self.clearance_max)
            .max(self.clearance_min)
    }
}

/// Nest registry tuning
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "config/")]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    #[ts(type = "number")]
    pub nest_count: usize,
    /// Nests further away than this are not reported
    pub detection_radius: f64,
    /// Seconds a vacated nest stays dormant
    pub reactivate_delay: f64,
    pub host_radius_min: f64,
    pub host_radius_max: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            nest_count: 12,
            detection_radius: 18.0,
            reactivate_delay: 5.0,
            host_radius_min: 2.0,
            host_radius_max: 6.0,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("detection_radius", self.detection_radius)?;
        require_non_negative("reactivate_delay", self.reactivate_delay)?;
        require_positive("host_radius_min", self.host_radius_min)?;
        if !self.host_radius_max.is_finite() || self.host_radius_max < self.host_radius_min {
            return Err(invalid("host_radius_max", "must be finite and >= host_radius_min"));
        }
        Ok(())
    }
}
