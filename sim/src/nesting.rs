//! Autonomous nesting: fly to a nest, perch, launch.
//!
//! ```text
//! Flying <-> Approaching --try_land_on_nest--> Landing --arrived--> Nested
//!    ^                                                                |
//!    +------------- timer elapsed --- TakingOff <------take_off-------+
//! ```
//!
//! The state machine steers any [`FlightBody`] and reads nests from any
//! [`NestRegistry`]. It never owns either; both are passed in per call.

use crate::flight::FlightBody;
use crate::nest_registry::{NestId, NestRegistry};
use nestflight_shared::config::{ConfigError, NestingConfig};
use nestflight_shared::math::{normalize_or, surface_normal, DQuat, DVec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NestingState {
    Flying,
    Approaching,
    Landing,
    Nested,
    TakingOff,
}

impl NestingState {
    /// Landing and Nested drive the body themselves; normal flight integration is skipped.
    pub fn is_autopiloted(self) -> bool {
        matches!(self, NestingState::Landing | NestingState::Nested)
    }

    /// Whether a landing may start from this state.
    pub fn can_land(self) -> bool {
        matches!(self, NestingState::Flying | NestingState::Approaching)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NestingState::Flying => "FLYING",
            NestingState::Approaching => "APPROACHING",
            NestingState::Landing => "LANDING",
            NestingState::Nested => "NESTED",
            NestingState::TakingOff => "TAKING_OFF",
        }
    }
}

/// A completed transition
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct StateChange {
    pub state: NestingState,
    pub previous: NestingState,
    /// Current nest after the transition
    pub nest: Option<NestId>,
}

/// Transitions kept for [`NestingSystem::take_changes`]; older ones are dropped
pub const MAX_PENDING_CHANGES: usize = 64;

const TIMER_EPSILON: f64 = 1e-9;

/// Called synchronously on every transition with (new, previous, current nest).
pub type StateChangeHook = Box<dyn FnMut(NestingState, NestingState, Option<NestId>) + Send>;

pub struct NestingSystem {
    config: NestingConfig,
    state: NestingState,
    current_nest: Option<NestId>,
    target_position: DVec3,
    target_orientation: DQuat,
    take_off_timer: f64,
    take_off_direction: DVec3,
    welcome_shown: bool,
    on_state_change: Option<StateChangeHook>,
    changes: Vec<StateChange>,
}

impl NestingSystem {
    pub fn new() -> Self {
        Self::from_valid(NestingConfig::default())
    }

    pub fn try_new(config: NestingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: NestingConfig) -> Self {
        Self {
            config,
            state: NestingState::Flying,
            current_nest: None,
            target_position: DVec3::ZERO,
            target_orientation: DQuat::IDENTITY,
            take_off_timer: 0.0,
            take_off_direction: DVec3::ZERO,
            welcome_shown: false,
            on_state_change: None,
            changes: Vec::new(),
        }
    }

    pub fn set_on_state_change(
        &mut self,
        hook: impl FnMut(NestingState, NestingState, Option<NestId>) + Send + 'static,
    ) {
        self.on_state_change = Some(Box::new(hook));
    }

    pub fn config(&self) -> &NestingConfig {
        &self.config
    }

    pub fn state(&self) -> NestingState {
        self.state
    }

    pub fn current_nest(&self) -> Option<NestId> {
        self.current_nest
    }

    /// Landing target, including the clearance offset.
    pub fn target_position(&self) -> DVec3 {
        self.target_position
    }

    pub fn target_orientation(&self) -> DQuat {
        self.target_orientation
    }

    pub fn take_off_timer(&self) -> f64 {
        self.take_off_timer
    }

    pub fn take_off_direction(&self) -> DVec3 {
        self.take_off_direction
    }

    /// Transitions since the last call, oldest first. At most
    /// [`MAX_PENDING_CHANGES`] are kept between calls.
    pub fn take_changes(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.changes)
    }

    fn transition(&mut self, to: NestingState) -> StateChange {
        let change = StateChange {
            state: to,
            previous: self.state,
            nest: self.current_nest,
        };
        self.state = to;
        tracing::debug!(
            from = change.previous.as_str(),
            to = to.as_str(),
            nest = ?change.nest,
            "Nesting state changed"
        );
        if let Some(hook) = self.on_state_change.as_mut() {
            hook(change.state, change.previous, change.nest);
        }
        if self.changes.len() == MAX_PENDING_CHANGES {
            self.changes.remove(0);
        }
        self.changes.push(change);
        change
    }

    /// Start auto-landing on the nearest active nest.
    /// Returns false without changing anything if no nest is available or a landing is already under way.
    pub fn try_land_on_nest<R: NestRegistry + ?Sized>(
        &mut self,
        position: DVec3,
        registry: &mut R,
    ) -> bool {
        if !self.state.can_land() {
            return false;
        }
        let Some(nest) = registry.nearest_active_nest(position) else {
            return false;
        };
        let (Some(nest_position), Some(orientation), Some(point)) = (
            registry.nest_world_position(nest),
            registry.nest_world_orientation(nest),
            registry.nest(nest),
        ) else {
            return false;
        };
        let clearance = point.clearance_radius;
        let normal = registry
            .nest_surface_normal(nest)
            .unwrap_or_else(|| surface_normal(nest_position));

        self.target_position = nest_position + normal * self.config.clearance_offset(clearance);
        self.target_orientation = orientation.normalize();
        self.current_nest = Some(nest);
        registry.set_nest_occupied(nest, true);

        tracing::info!(nest = nest.0, "Landing on nest");
        self.transition(NestingState::Landing);
        true
    }

    /// Leave the nest, launching along the surface normal blended with the body's facing.
    pub fn take_off<B, R>(&mut self, body: &mut B, registry: &mut R) -> bool
    where
        B: FlightBody + ?Sized,
        R: NestRegistry + ?Sized,
    {
        let look = body.look_forward();
        self.take_off_toward(look, body, registry)
    }

    /// Like [`take_off`](Self::take_off) with an explicit look direction, e.g. from the aim rig.
    pub fn take_off_toward<B, R>(&mut self, look_forward: DVec3, body: &mut B, registry: &mut R) -> bool
    where
        B: FlightBody + ?Sized,
        R: NestRegistry + ?Sized,
    {
        if self.state != NestingState::Nested {
            return false;
        }
        let Some(nest) = self.current_nest else {
            return false;
        };

        let normal = registry
            .nest_surface_normal(nest)
            .unwrap_or_else(|| surface_normal(body.position()));
        let blended = normal + normalize_or(look_forward, DVec3::ZERO) * self.config.launch_forward_weight;
        self.take_off_direction = normalize_or(blended, normal);

        registry.set_nest_occupied(nest, false);
        self.take_off_timer = self.config.take_off_duration;
        // Fixed speed, not the speed the flyer arrived with
        body.set_speed(self.config.take_off_speed);
        self.welcome_shown = false;

        tracing::info!(nest = nest.0, "Taking off");
        self.transition(NestingState::TakingOff);
        true
    }

    /// True exactly once per perch, the first time it is asked while nested.
    pub fn should_show_welcome(&mut self) -> bool {
        if self.state == NestingState::Nested && !self.welcome_shown {
            self.welcome_shown = true;
            return true;
        }
        false
    }

    /// Advance one frame. Zero-length frames are ignored.
    pub fn update<B, R>(&mut self, dt: f64, body: &mut B, registry: &mut R) -> Option<StateChange>
    where
        B: FlightBody + ?Sized,
        R: NestRegistry + ?Sized,
    {
        if dt <= 0.0 {
            return None;
        }
        registry.update(dt, body.position());

        match self.state {
            NestingState::Flying => registry
                .nearest_active_nest(body.position())
                .map(|_| self.transition(NestingState::Approaching)),
            NestingState::Approaching => {
                if registry.nearest_active_nest(body.position()).is_none() {
                    Some(self.transition(NestingState::Flying))
                } else {
                    None
                }
            }
            NestingState::Landing => self.step_landing(dt, body),
            NestingState::Nested => {
                body.set_speed(0.0);
                body.set_velocity(DVec3::ZERO);
                None
            }
            NestingState::TakingOff => self.step_take_off(dt, body),
        }
    }

    fn step_landing<B: FlightBody + ?Sized>(&mut self, dt: f64, body: &mut B) -> Option<StateChange> {
        let threshold = self.config.arrival_threshold;
        let position = body.position();
        let to_target = self.target_position - position;
        let distance = to_target.length();
        if distance < threshold {
            return Some(self.arrive(body));
        }

        // distance / dt keeps the last step from overshooting
        let speed = self.config.auto_fly_speed.min(distance / dt);
        let velocity = to_target / distance * speed;
        body.set_velocity(velocity);
        body.set_position(position + velocity * dt);

        let t = (self.config.orientation_catch_up * dt).min(1.0);
        let orientation = body.orientation().slerp(self.target_orientation, t);
        body.set_orientation(orientation, true);

        if body.position().distance(self.target_position) < threshold {
            return Some(self.arrive(body));
        }
        None
    }

    fn arrive<B: FlightBody + ?Sized>(&mut self, body: &mut B) -> StateChange {
        body.set_position(self.target_position);
        body.set_orientation(self.target_orientation, false);
        body.set_velocity(DVec3::ZERO);
        body.set_speed(0.0);
        self.transition(NestingState::Nested)
    }

    fn step_take_off<B: FlightBody + ?Sized>(&mut self, dt: f64, body: &mut B) -> Option<StateChange> {
        self.take_off_timer -= dt;
        // Repeated subtraction leaves a tiny positive residue on exact multiples of dt
        if self.take_off_timer <= TIMER_EPSILON * self.config.take_off_duration {
            self.take_off_timer = 0.0;
            self.current_nest = None;
            return Some(self.transition(NestingState::Flying));
        }

        let boost = self.config.take_off_boost * (self.take_off_timer / self.config.take_off_duration);
        let launch = self.take_off_direction * boost;
        body.set_velocity(launch);
        body.set_position(body.position() + launch * dt);
        None
    }

    /// Back to Flying, releasing any nest still held. Used on level or session restart.
    pub fn reset<R: NestRegistry + ?Sized>(&mut self, registry: &mut R) {
        if let Some(nest) = self.current_nest.take() {
            // Occupancy is already released once take-off has begun
            if matches!(self.state, NestingState::Landing | NestingState::Nested) {
                registry.set_nest_occupied(nest, false);
            }
        }
        self.take_off_timer = 0.0;
        self.take_off_direction = DVec3::ZERO;
        self.welcome_shown = false;
        if self.state != NestingState::Flying {
            self.transition(NestingState::Flying);
        }
    }

    /// Reset and drop the state-change hook.
    pub fn dispose<R: NestRegistry + ?Sized>(mut self, registry: &mut R) {
        self.reset(registry);
        self.on_state_change = None;
    }
}

impl Default for NestingSystem {
    fn default() -> Self {
        Self::new()
    }
}
