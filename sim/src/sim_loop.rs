use crate::config::SessionConfig;
use crate::flight::KinematicState;
use crate::nest_registry::NestId;
use crate::nesting::{NestingState, StateChange};
use crate::pilot::Autopilot;
use crate::session::{FlightSession, FrameInput};
use nestflight_shared::config::ConfigError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Commands to the running simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    Land,
    TakeOff,
    Reset,
    SetInvertPitch(bool),
    Stop,
}

/// Broadcasts from the simulation loop
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    StateChanged { frame: u64, change: StateChange },
    Welcome { frame: u64, nest: Option<NestId> },
    Snapshot {
        frame: u64,
        state: NestingState,
        altitude: f64,
        kinematics: KinematicState,
    },
    Stopped { summary: SessionSummary },
}

/// Totals for one run
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub frames: u64,
    pub landings: u32,
    pub take_offs: u32,
    pub collisions: u32,
    pub final_state: NestingState,
}

/// Run the simulation until `Stop` or until every command sender is dropped.
pub async fn run_sim_loop(
    mut cmd_rx: mpsc::Receiver<SimCommand>,
    event_tx: broadcast::Sender<SimEvent>,
    config: SessionConfig,
) -> Result<SessionSummary, ConfigError> {
    config.validate()?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
    let mut session = FlightSession::new(config.clone(), &mut rng)?;
    let mut pilot = Autopilot::random(&mut rng);

    let dt = 1.0 / config.tick_rate_hz as f64;
    let snapshot_every_n = (config.tick_rate_hz / config.snapshot_rate_hz).max(1) as u64;

    let mut tick_interval = tokio::time::interval(Duration::from_secs_f64(dt));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Manual requests are merged into the next frame's autopilot input
    let mut pending = FrameInput::default();
    let mut summary = SessionSummary {
        frames: 0,
        landings: 0,
        take_offs: 0,
        collisions: 0,
        final_state: session.state(),
    };

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let mut input = pilot.next_input(&session, dt, &mut rng);
                input.land |= pending.land;
                input.take_off |= pending.take_off;
                input.reset |= pending.reset;
                pending = FrameInput::default();

                let report = session.step(&input, dt);
                summary.frames += 1;
                if report.collision.is_some() {
                    summary.collisions += 1;
                }

                for change in &report.changes {
                    match change.state {
                        NestingState::Nested => summary.landings += 1,
                        NestingState::TakingOff => summary.take_offs += 1,
                        _ => {}
                    }
                    let _ = event_tx.send(SimEvent::StateChanged {
                        frame: report.frame,
                        change: *change,
                    });
                }

                if report.show_welcome {
                    let _ = event_tx.send(SimEvent::Welcome {
                        frame: report.frame,
                        nest: session.nesting().current_nest(),
                    });
                }

                if report.frame % snapshot_every_n == 0 {
                    let _ = event_tx.send(SimEvent::Snapshot {
                        frame: report.frame,
                        state: report.state,
                        altitude: session.altitude(),
                        kinematics: report.kinematics,
                    });
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SimCommand::Land) => pending.land = true,
                    Some(SimCommand::TakeOff) => pending.take_off = true,
                    Some(SimCommand::Reset) => pending.reset = true,
                    Some(SimCommand::SetInvertPitch(invert)) => {
                        session.set_invert_pitch(invert);
                        tracing::info!("Pitch inversion set to {}", invert);
                    }
                    Some(SimCommand::Stop) | None => break,
                }
            }
        }
    }

    summary.final_state = session.state();
    tracing::info!(
        frames = summary.frames,
        landings = summary.landings,
        "Simulation loop ended"
    );
    let _ = event_tx.send(SimEvent::Stopped {
        summary: summary.clone(),
    });
    Ok(summary)
}
