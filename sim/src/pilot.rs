//! Scripted pilot for headless runs.
//!
//! An autopilot is a small state machine layered over the session's nesting
//! state. It produces one [`FrameInput`] per frame:
//! - wanders or seeks the closest free nest while flying
//! - asks to land as soon as a nest is in range
//! - rests on the nest, looking around, then takes off

use crate::aim::AimInput;
use crate::flight::FlightBody;
use crate::nesting::NestingState;
use crate::session::{FlightSession, FrameInput};
use nestflight_shared::math::{normalize_or, DVec3};
use rand::Rng;

/// Below this altitude the pilot pulls up regardless of its goal
const MIN_CRUISE_ALTITUDE: f64 = 4.0;

/// Steering gain from direction error to pitch input
const PITCH_GAIN: f64 = 2.0;

/// Mood affects how long the pilot rests and how much it looks around
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PilotMood {
    /// Short rests (1.0-2.5s)
    Restless,
    /// Long rests (4.0-8.0s)
    Lazy,
    /// Medium rests (2.0-5.0s), looks around a lot
    Curious,
}

impl PilotMood {
    /// Rest range for this mood (min, max) in seconds
    fn rest_range(&self) -> (f64, f64) {
        match self {
            PilotMood::Restless => (1.0, 2.5),
            PilotMood::Lazy => (4.0, 8.0),
            PilotMood::Curious => (2.0, 5.0),
        }
    }

    fn random_rest(&self, rng: &mut impl Rng) -> f64 {
        let (min, max) = self.rest_range();
        min + rng.gen::<f64>() * (max - min)
    }

    /// Peak look-around axis while perched
    fn look_amplitude(&self) -> f64 {
        match self {
            PilotMood::Curious => 1.0,
            _ => 0.4,
        }
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        match rng.gen_range(0..3) {
            0 => PilotMood::Restless,
            1 => PilotMood::Lazy,
            _ => PilotMood::Curious,
        }
    }
}

#[derive(Debug)]
pub struct Autopilot {
    pub mood: PilotMood,
    /// Current wander steering (yaw, pitch)
    wander: (f64, f64),
    /// Time until the wander steering is re-rolled
    wander_timer: f64,
    /// Remaining rest on the current perch
    rest_timer: Option<f64>,
    /// Seconds spent perched, drives the look-around sweep
    perched_for: f64,
}

impl Autopilot {
    pub fn new(mood: PilotMood) -> Self {
        Self {
            mood,
            wander: (0.0, 0.0),
            wander_timer: 0.0,
            rest_timer: None,
            perched_for: 0.0,
        }
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        let mood = PilotMood::random(rng);
        tracing::info!("Autopilot created with {:?} mood", mood);
        Self::new(mood)
    }

    /// Input for the next frame of `session`.
    pub fn next_input(
        &mut self,
        session: &FlightSession,
        dt: f64,
        rng: &mut impl Rng,
    ) -> FrameInput {
        let state = session.state();
        if state != NestingState::Nested {
            self.rest_timer = None;
            self.perched_for = 0.0;
        }

        match state {
            NestingState::Flying => {
                let (steer_yaw, steer_pitch) = match closest_free_nest(session) {
                    Some(target) => steer_toward(session, target),
                    None => self.wander(dt, rng),
                };
                FrameInput {
                    steer_yaw,
                    steer_pitch: hold_altitude(session, steer_pitch),
                    ..Default::default()
                }
            }
            NestingState::Approaching => FrameInput {
                land: true,
                ..Default::default()
            },
            NestingState::Landing => FrameInput::default(),
            NestingState::Nested => {
                let mood = self.mood;
                let rest = self
                    .rest_timer
                    .get_or_insert_with(|| mood.random_rest(rng));
                *rest -= dt;
                let done = *rest <= 0.0;
                self.perched_for += dt;

                let sweep = (self.perched_for * 0.8).sin() * mood.look_amplitude();
                if done {
                    self.rest_timer = None;
                }
                FrameInput {
                    aim: AimInput {
                        axis_x: sweep,
                        ..Default::default()
                    },
                    take_off: done,
                    ..Default::default()
                }
            }
            NestingState::TakingOff => FrameInput {
                steer_pitch: 0.3,
                ..Default::default()
            },
        }
    }

    fn wander(&mut self, dt: f64, rng: &mut impl Rng) -> (f64, f64) {
        self.wander_timer -= dt;
        if self.wander_timer <= 0.0 {
            self.wander = (rng.gen_range(-0.6..0.6), rng.gen_range(-0.2..0.2));
            self.wander_timer = rng.gen_range(2.0..4.0);
        }
        self.wander
    }
}

/// Nearest nest that is free, ignoring detection range.
fn closest_free_nest(session: &FlightSession) -> Option<DVec3> {
    let position = session.flight().position();
    session
        .registry()
        .iter()
        .filter(|(_, nest)| nest.active && !nest.occupied)
        .map(|(_, nest)| nest.position)
        .min_by(|a, b| a.distance(position).total_cmp(&b.distance(position)))
}

/// (yaw, pitch) steering that turns the flyer toward `target`.
fn steer_toward(session: &FlightSession, target: DVec3) -> (f64, f64) {
    let flight = session.flight();
    let forward = flight.forward();
    let wanted = normalize_or(target - flight.position(), forward);
    // Right turn when the target is on the right: (f x t).y < 0
    let yaw = (-forward.cross(wanted).y * 2.0).clamp(-1.0, 1.0);
    let pitch = ((wanted.y - forward.y) * PITCH_GAIN).clamp(-1.0, 1.0);
    (yaw, pitch)
}

fn hold_altitude(session: &FlightSession, pitch: f64) -> f64 {
    if session.altitude() < MIN_CRUISE_ALTITUDE {
        pitch.max(0.5)
    } else {
        pitch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::nest_registry::SphereNestRegistry;
    use nestflight_shared::math::{build_tangent_basis, look_rotation};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DT: f64 = 1.0 / 60.0;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn open_sky() -> FlightSession {
        FlightSession::from_parts(SessionConfig::default(), SphereNestRegistry::new(), Vec::new())
            .unwrap()
    }

    fn nest_ahead() -> FlightSession {
        let config = SessionConfig::default();
        let radius = config.collision.sphere_radius;
        let normal = DVec3::new(0.0, 52.0, -8.0).normalize();
        let (tangent, _) = build_tangent_basis(normal);
        let mut registry = SphereNestRegistry::try_new(config.registry).unwrap();
        registry.add_nest(normal * (radius + 2.0), look_rotation(tangent, normal), 2.0);
        FlightSession::from_parts(config, registry, Vec::new()).unwrap()
    }

    #[test]
    fn rest_delay_within_mood_range() {
        let mut rng = test_rng();
        for mood in [PilotMood::Restless, PilotMood::Lazy, PilotMood::Curious] {
            let (min, max) = mood.rest_range();
            for _ in 0..100 {
                let rest = mood.random_rest(&mut rng);
                assert!(rest >= min && rest <= max);
            }
        }
    }

    #[test]
    fn random_mood_covers_all() {
        let mut rng = test_rng();
        let moods: Vec<PilotMood> = (0..100).map(|_| PilotMood::random(&mut rng)).collect();
        assert!(moods.contains(&PilotMood::Restless));
        assert!(moods.contains(&PilotMood::Lazy));
        assert!(moods.contains(&PilotMood::Curious));
    }

    #[test]
    fn wander_steering_is_held_between_rerolls() {
        let mut rng = test_rng();
        let session = open_sky();
        let mut pilot = Autopilot::new(PilotMood::Lazy);
        let first = pilot.next_input(&session, DT, &mut rng);
        let second = pilot.next_input(&session, DT, &mut rng);
        assert_eq!(first.steer_yaw, second.steer_yaw);
        assert!(first.steer_yaw.abs() <= 0.6);
        assert!(!first.land && !first.take_off);
    }

    #[test]
    fn steers_right_toward_target_on_the_right() {
        let session = open_sky();
        let target = session.flight().position() + DVec3::new(10.0, 0.0, -10.0);
        let (yaw, pitch) = steer_toward(&session, target);
        assert!(yaw > 0.0);
        assert!(pitch.abs() < 1e-9);
    }

    #[test]
    fn pulls_up_near_the_ground() {
        let config = SessionConfig {
            spawn_altitude: 1.0,
            ..Default::default()
        };
        let session =
            FlightSession::from_parts(config, SphereNestRegistry::new(), Vec::new()).unwrap();
        assert_eq!(hold_altitude(&session, -1.0), 0.5);
    }

    #[test]
    fn requests_landing_when_approaching() {
        let mut rng = test_rng();
        let mut session = nest_ahead();
        session.step(&FrameInput::default(), DT);
        assert_eq!(session.state(), NestingState::Approaching);

        let mut pilot = Autopilot::new(PilotMood::Restless);
        assert!(pilot.next_input(&session, DT, &mut rng).land);
    }

    #[test]
    fn full_visit_lands_rests_and_leaves() {
        let mut rng = test_rng();
        let mut session = nest_ahead();
        let mut pilot = Autopilot::new(PilotMood::Restless);
        let mut seen = Vec::new();

        for _ in 0..(20.0 / DT) as usize {
            let input = pilot.next_input(&session, DT, &mut rng);
            let report = session.step(&input, DT);
            seen.extend(report.changes.iter().map(|c| c.state));
        }

        let nested = seen.iter().position(|s| *s == NestingState::Nested);
        let took_off = seen.iter().position(|s| *s == NestingState::TakingOff);
        assert!(nested.is_some());
        assert!(took_off > nested);
    }
}
