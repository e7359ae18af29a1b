use nestflight_shared::config::{
    load_json, AimConfig, CollisionConfig, ConfigError, FlightConfig, NestingConfig,
    RegistryConfig,
};

/// Environment variable naming a JSON session config file
pub const CONFIG_ENV: &str = "NESTFLIGHT_CONFIG";

/// Longest headless run accepted (one week)
pub const MAX_RUN_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

/// Headless session configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub tick_rate_hz: u32,
    pub snapshot_rate_hz: u32,
    pub rng_seed: u64,
    /// How long the binary runs before stopping (seconds)
    pub run_seconds: f64,
    /// Collision radius of the flyer
    pub entity_radius: f64,
    /// Spawn height above the ground sphere
    pub spawn_altitude: f64,
    /// Surface cells available for nests and obstacles
    pub surface_cells: usize,
    pub obstacle_count: usize,
    pub obstacle_radius_min: f64,
    pub obstacle_radius_max: f64,
    pub flight: FlightConfig,
    pub aim: AimConfig,
    pub collision: CollisionConfig,
    pub nesting: NestingConfig,
    pub registry: RegistryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            snapshot_rate_hz: 2,
            rng_seed: 42,
            run_seconds: 60.0,
            entity_radius: 0.5,
            spawn_altitude: 12.0,
            surface_cells: 256,
            obstacle_count: 24,
            obstacle_radius_min: 1.0,
            obstacle_radius_max: 3.0,
            flight: FlightConfig {
                // The ground sphere replaces the flat floor
                min_altitude: None,
                ..Default::default()
            },
            aim: AimConfig::default(),
            collision: CollisionConfig::default(),
            nesting: NestingConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load from the file named by `NESTFLIGHT_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => load_json(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| ConfigError::Invalid { field, reason };

        if self.tick_rate_hz == 0 {
            return Err(invalid("tick_rate_hz", "must be > 0"));
        }
        if self.snapshot_rate_hz == 0 || self.snapshot_rate_hz > self.tick_rate_hz {
            return Err(invalid("snapshot_rate_hz", "must be within [1, tick_rate_hz]"));
        }
        if !(self.run_seconds > 0.0 && self.run_seconds <= MAX_RUN_SECONDS) {
            return Err(invalid("run_seconds", "must be > 0 and at most one week"));
        }
        if !self.entity_radius.is_finite() || self.entity_radius <= 0.0 {
            return Err(invalid("entity_radius", "must be finite and > 0"));
        }
        if !self.spawn_altitude.is_finite() || self.spawn_altitude < self.entity_radius {
            return Err(invalid("spawn_altitude", "must be finite and >= entity_radius"));
        }
        if self.registry.nest_count + self.obstacle_count > self.surface_cells {
            return Err(invalid(
                "surface_cells",
                "must fit every nest and obstacle",
            ));
        }
        if !self.obstacle_radius_min.is_finite()
            || self.obstacle_radius_min <= 0.0
            || self.obstacle_radius_max < self.obstacle_radius_min
        {
            return Err(invalid(
                "obstacle_radius_min",
                "must be > 0 and <= obstacle_radius_max",
            ));
        }
        self.flight.validate()?;
        self.aim.validate()?;
        self.collision.validate()?;
        self.nesting.validate()?;
        self.registry.validate()?;
        Ok(())
    }
}
