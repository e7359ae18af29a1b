use nestflight_sim::config::SessionConfig;
use nestflight_sim::sim_loop::{run_sim_loop, SimCommand, SimEvent};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match SessionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load session configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid session configuration: {}", e);
        std::process::exit(1);
    }

    let run_for = match Duration::try_from_secs_f64(config.run_seconds) {
        Ok(run_for) => run_for,
        Err(e) => {
            eprintln!("Invalid run length {}: {}", config.run_seconds, e);
            std::process::exit(1);
        }
    };
    let (cmd_tx, cmd_rx) = mpsc::channel::<SimCommand>(64);
    let (event_tx, mut event_rx) = broadcast::channel::<SimEvent>(256);

    tracing::info!(seed = config.rng_seed, "Starting nestflight simulation");
    let sim = tokio::spawn(run_sim_loop(cmd_rx, event_tx, config));

    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(SimEvent::StateChanged { frame, change }) => tracing::info!(
                    frame,
                    from = change.previous.as_str(),
                    to = change.state.as_str(),
                    "State change"
                ),
                Ok(SimEvent::Welcome { frame, nest }) => {
                    tracing::info!(frame, nest = ?nest, "Welcome to the nest")
                }
                Ok(SimEvent::Snapshot {
                    frame,
                    state,
                    altitude,
                    ..
                }) => tracing::debug!(frame, state = state.as_str(), altitude, "Snapshot"),
                Ok(SimEvent::Stopped { .. }) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(n)) => tracing::warn!("Event logger lagged by {}", n),
            }
        }
    });

    tokio::select! {
        _ = tokio::time::sleep(run_for) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }
    let _ = cmd_tx.send(SimCommand::Stop).await;

    match sim.await {
        Ok(Ok(summary)) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode summary: {}", e),
        },
        Ok(Err(e)) => {
            eprintln!("Simulation failed: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Simulation task failed: {}", e);
            std::process::exit(1);
        }
    }
}
