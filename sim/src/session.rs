use crate::aim::{AimInput, AimRig};
use crate::collision::{Collider, ColliderKind, CollisionResult, CollisionSystem};
use crate::config::SessionConfig;
use crate::flight::{FlightBody, FlightController, KinematicState};
use crate::nest_registry::{NestRegistry, SphereNestRegistry};
use crate::nesting::{NestingState, NestingSystem, StateChange};
use crate::sphere::SurfacePlacement;
use nestflight_shared::config::ConfigError;
use nestflight_shared::math::{DQuat, DVec3};
use rand::Rng;

/// Control input for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Steering, positive turns right
    pub steer_yaw: f64,
    /// Steering, positive climbs
    pub steer_pitch: f64,
    pub aim: AimInput,
    pub land: bool,
    pub take_off: bool,
    pub reset: bool,
}

/// What happened during one frame
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    pub frame: u64,
    pub state: NestingState,
    pub changes: Vec<StateChange>,
    pub show_welcome: bool,
    /// Present only when a surface was hit
    pub collision: Option<CollisionResult>,
    pub kinematics: KinematicState,
    pub look_direction: DVec3,
}

/// One flyer on one world. Owns every simulation component and runs them in frame order.
pub struct FlightSession {
    config: SessionConfig,
    flight: FlightController,
    nesting: NestingSystem,
    collision: CollisionSystem,
    aim: AimRig,
    registry: SphereNestRegistry,
    spawn_position: DVec3,
    frame: u64,
}

impl FlightSession {
    /// Build a world: nests on host trees plus scattered rocks and structures.
    pub fn new(config: SessionConfig, rng: &mut impl Rng) -> Result<Self, ConfigError> {
        config.validate()?;
        let sphere_radius = config.collision.sphere_radius;
        let mut placement = SurfacePlacement::new(config.surface_cells, rng);

        let (registry, mut colliders) =
            SphereNestRegistry::scatter(config.registry, sphere_radius, &mut placement, rng)?;

        for _ in 0..config.obstacle_count {
            let Some(cell) = placement.allocate() else {
                tracing::warn!("No free surface cells left for obstacles");
                break;
            };
            let kind = if rng.gen_bool(0.7) {
                ColliderKind::Rock
            } else {
                ColliderKind::Structure
            };
            colliders.push(Collider {
                position: placement.direction(cell) * sphere_radius,
                radius: rng.gen_range(config.obstacle_radius_min..=config.obstacle_radius_max),
                kind,
            });
        }

        tracing::info!(
            nests = registry.len(),
            colliders = colliders.len(),
            "World generated"
        );
        Self::from_parts(config, registry, colliders)
    }

    /// Build a session around an existing registry and obstacle list.
    pub fn from_parts(
        config: SessionConfig,
        registry: SphereNestRegistry,
        colliders: Vec<Collider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let spawn_position =
            DVec3::Y * (config.collision.sphere_radius + config.spawn_altitude);

        let flight = FlightController::try_new(config.flight, spawn_position)?;
        let nesting = NestingSystem::try_new(config.nesting)?;
        let mut collision = CollisionSystem::try_new(config.collision)?;
        for collider in colliders {
            collision.add_collider(collider);
        }
        let mut aim = AimRig::try_new(config.aim)?;
        aim.set_reference_from_quaternion(flight.orientation());

        Ok(Self {
            config,
            flight,
            nesting,
            collision,
            aim,
            registry,
            spawn_position,
            frame: 0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn flight(&self) -> &FlightController {
        &self.flight
    }

    pub fn nesting(&self) -> &NestingSystem {
        &self.nesting
    }

    pub fn nesting_mut(&mut self) -> &mut NestingSystem {
        &mut self.nesting
    }

    pub fn collision(&self) -> &CollisionSystem {
        &self.collision
    }

    pub fn aim(&self) -> &AimRig {
        &self.aim
    }

    pub fn aim_mut(&mut self) -> &mut AimRig {
        &mut self.aim
    }

    pub fn registry(&self) -> &SphereNestRegistry {
        &self.registry
    }

    pub fn state(&self) -> NestingState {
        self.nesting.state()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Height above the ground sphere.
    pub fn altitude(&self) -> f64 {
        self.flight.position().length() - self.collision.sphere_radius()
    }

    pub fn set_invert_pitch(&mut self, invert: bool) {
        self.flight.set_invert_pitch(invert);
    }

    /// Release every nest and put the flyer back at the spawn point.
    pub fn restart(&mut self) {
        self.nesting.reset(&mut self.registry);
        self.registry.reset();
        self.flight.respawn(self.spawn_position, DQuat::IDENTITY);
        self.aim.set_reference_from_quaternion(self.flight.orientation());
        tracing::info!(frame = self.frame, "Session restarted");
    }

    /// Run one frame: requests, flight, nesting, collision, aim.
    pub fn step(&mut self, input: &FrameInput, dt: f64) -> FrameReport {
        self.frame += 1;

        if input.reset {
            self.restart();
        }

        self.flight.set_inputs(input.steer_yaw, input.steer_pitch);

        if input.land
            && !self
                .nesting
                .try_land_on_nest(self.flight.position(), &mut self.registry)
        {
            tracing::warn!(
                state = self.nesting.state().as_str(),
                "Landing request rejected"
            );
        }
        if input.take_off {
            let look = self.aim.look_direction();
            if !self
                .nesting
                .take_off_toward(look, &mut self.flight, &mut self.registry)
            {
                tracing::warn!(
                    state = self.nesting.state().as_str(),
                    "Take-off request rejected"
                );
            }
        }

        if !self.nesting.state().is_autopiloted() {
            self.flight.update(dt);
        }
        self.nesting.update(dt, &mut self.flight, &mut self.registry);

        let mut collision = None;
        if self.nesting.state() != NestingState::Nested {
            let result = self.collision.check_all_collisions(
                self.flight.position(),
                self.flight.velocity(),
                self.config.entity_radius,
            );
            if result.collided() {
                self.flight.set_position(result.position);
                self.flight.set_velocity(result.velocity);
                collision = Some(result);
            }
        }

        let changes = self.nesting.take_changes();
        // Look around relative to the perch, and relaunch from the facing at take-off
        if changes
            .iter()
            .any(|c| matches!(c.state, NestingState::Nested | NestingState::TakingOff))
        {
            self.aim
                .set_reference_from_quaternion(self.flight.orientation());
        }
        self.aim.update(&input.aim, dt);

        FrameReport {
            frame: self.frame,
            state: self.nesting.state(),
            changes,
            show_welcome: self.nesting.should_show_welcome(),
            collision,
            kinematics: *self.flight.state(),
            look_direction: self.aim.look_direction(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestflight_shared::math::{build_tangent_basis, look_rotation};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DT: f64 = 1.0 / 60.0;

    /// One nest 13 units from the spawn point, no obstacles.
    fn session_with_nearby_nest() -> FlightSession {
        let config = SessionConfig::default();
        let radius = config.collision.sphere_radius;
        let normal = DVec3::new(0.0, 52.0, -8.0).normalize();
        let (tangent, _) = build_tangent_basis(normal);
        let mut registry = SphereNestRegistry::try_new(config.registry).unwrap();
        registry.add_nest(normal * (radius + 2.0), look_rotation(tangent, normal), 2.0);
        FlightSession::from_parts(config, registry, Vec::new()).unwrap()
    }

    fn land(session: &mut FlightSession) -> Vec<FrameReport> {
        let mut reports = vec![session.step(
            &FrameInput {
                land: true,
                ..Default::default()
            },
            DT,
        )];
        for _ in 0..600 {
            let report = session.step(&FrameInput::default(), DT);
            let nested = report.state == NestingState::Nested;
            reports.push(report);
            if nested {
                break;
            }
        }
        reports
    }

    #[test]
    fn generated_world_has_nests_and_obstacles() {
        let config = SessionConfig::default();
        let session =
            FlightSession::new(config.clone(), &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(session.registry().len(), config.registry.nest_count);
        assert_eq!(
            session.collision().colliders().len(),
            config.registry.nest_count + config.obstacle_count
        );
        assert!((session.altitude() - config.spawn_altitude).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_world() {
        let a = FlightSession::new(SessionConfig::default(), &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        let b = FlightSession::new(SessionConfig::default(), &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        assert_eq!(a.collision().colliders(), b.collision().colliders());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = SessionConfig {
            entity_radius: 0.0,
            ..Default::default()
        };
        assert!(FlightSession::new(config, &mut ChaCha8Rng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn nearby_nest_puts_flyer_in_approach() {
        let mut session = session_with_nearby_nest();
        let report = session.step(&FrameInput::default(), DT);
        assert_eq!(report.state, NestingState::Approaching);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].previous, NestingState::Flying);
    }

    #[test]
    fn landing_request_ends_nested_with_welcome_once() {
        let mut session = session_with_nearby_nest();
        let reports = land(&mut session);
        assert_eq!(reports[0].state, NestingState::Landing);

        let last = reports.last().unwrap();
        assert_eq!(last.state, NestingState::Nested);
        assert!(last.show_welcome);
        assert!(session
            .flight()
            .position()
            .abs_diff_eq(session.nesting().target_position(), 1e-9));
        assert_eq!(session.registry().occupied_count(), 1);

        let next = session.step(&FrameInput::default(), DT);
        assert!(!next.show_welcome);
        assert_eq!(next.kinematics.velocity, DVec3::ZERO);
    }

    #[test]
    fn aim_is_rebased_on_the_perch() {
        let mut session = session_with_nearby_nest();
        land(&mut session);
        let perch_forward = session.flight().orientation() * nestflight_shared::math::FORWARD;
        assert!(session.aim().reference().forward.abs_diff_eq(perch_forward, 1e-9));
        assert_eq!(session.aim().yaw(), 0.0);
    }

    #[test]
    fn nested_flyer_does_not_move_under_steering() {
        let mut session = session_with_nearby_nest();
        land(&mut session);
        let parked = session.flight().position();
        let input = FrameInput {
            steer_yaw: 1.0,
            steer_pitch: -1.0,
            ..Default::default()
        };
        for _ in 0..30 {
            session.step(&input, DT);
        }
        assert_eq!(session.flight().position(), parked);
    }

    #[test]
    fn take_off_leaves_along_launch_direction_then_flies() {
        let mut session = session_with_nearby_nest();
        land(&mut session);
        let parked = session.flight().position();

        let report = session.step(
            &FrameInput {
                take_off: true,
                ..Default::default()
            },
            DT,
        );
        assert_eq!(report.state, NestingState::TakingOff);
        assert_eq!(session.registry().occupied_count(), 0);
        assert!(session.altitude() > parked.length() - session.collision().sphere_radius());

        let duration = session.nesting().config().take_off_duration;
        let steps = (duration / DT).ceil() as usize + 1;
        let mut state = report.state;
        for _ in 0..steps {
            state = session.step(&FrameInput::default(), DT).state;
        }
        assert!(matches!(
            state,
            NestingState::Flying | NestingState::Approaching
        ));
        assert_eq!(session.nesting().current_nest(), None);
    }

    #[test]
    fn rejected_requests_change_nothing() {
        let mut session =
            FlightSession::from_parts(SessionConfig::default(), SphereNestRegistry::new(), Vec::new())
                .unwrap();
        let report = session.step(
            &FrameInput {
                land: true,
                take_off: true,
                ..Default::default()
            },
            DT,
        );
        assert_eq!(report.state, NestingState::Flying);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn ground_contact_is_corrected_and_reported() {
        let config = SessionConfig {
            spawn_altitude: 0.5,
            ..Default::default()
        };
        let mut session =
            FlightSession::from_parts(config, SphereNestRegistry::new(), Vec::new()).unwrap();
        let dive = FrameInput {
            steer_pitch: -1.0,
            ..Default::default()
        };
        let hit = (0..120)
            .map(|_| session.step(&dive, DT))
            .find_map(|r| r.collision)
            .expect("should reach the ground");
        assert!(hit.hit_ground);
        assert!(session.altitude() >= session.config().entity_radius - 1e-9);
    }

    #[test]
    fn reset_releases_nest_and_respawns() {
        let mut session = session_with_nearby_nest();
        land(&mut session);
        let report = session.step(
            &FrameInput {
                reset: true,
                ..Default::default()
            },
            DT,
        );
        assert_eq!(session.registry().occupied_count(), 0);
        assert!(report
            .changes
            .iter()
            .any(|c| c.previous == NestingState::Nested && c.state == NestingState::Flying));
        assert_ne!(report.state, NestingState::Nested);
        assert!(session.altitude() > session.config().spawn_altitude - 1.0);
    }

    #[test]
    fn frame_counter_advances() {
        let mut session = session_with_nearby_nest();
        for _ in 0..5 {
            session.step(&FrameInput::default(), DT);
        }
        assert_eq!(session.frame(), 5);
    }
}
